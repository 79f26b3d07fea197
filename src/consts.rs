//! Analysis-wide parameters

/// Marker for an uninitialized in-edge cursor or index slot.
pub const UN_INIT: usize = usize::MAX;

/// Lowest label value reserved for synthesized instructions. Real image
/// offsets stay below the 1MiB real-mode address space, so anything at or
/// above this bound never resolves to a scanned instruction.
pub const SYNTHESIZED_MIN: u32 = 0x0010_0000;

/// Traversal marker: node visited by the fall-through merge pass.
pub const DFS_MERGE: u32 = 1;

/// Traversal marker: node visited by the numbering pass.
pub const DFS_NUM: u32 = 2;

/// Base for per-origin jump-elision markers; the origin instruction index is
/// added so each chase gets a fresh marker.
pub const DFS_JMP: u32 = 3;

/// Spaces per indentation level in rendered output.
pub const INDENT_WIDTH: usize = 4;
