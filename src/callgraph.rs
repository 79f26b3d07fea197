//! Inter-procedural call tree.

use crate::bundle::indent_str;
use crate::function::{FuncId, Function};

use std::fmt;

/// Node of the call tree: a procedure and, in insertion order, the
/// procedures it calls. A `(caller, callee)` arc appears at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallGraph {
    proc: FuncId,
    out_edges: Vec<CallGraph>,
}

impl CallGraph {
    /// Tree rooted at `proc`.
    pub const fn new(proc: FuncId) -> Self {
        Self {
            proc,
            out_edges: Vec::new(),
        }
    }

    /// Procedure of this node.
    pub const fn proc(&self) -> FuncId {
        self.proc
    }

    /// Child subtrees in insertion order.
    pub fn callees(&self) -> &[CallGraph] {
        &self.out_edges
    }

    /// Append an arc to `callee` unless one already exists.
    fn insert_arc(&mut self, callee: FuncId) {
        if self.out_edges.iter().any(|edge| edge.proc == callee) {
            return;
        }
        self.out_edges.push(CallGraph::new(callee));
    }

    /// Record that `caller` invokes `callee`. Descends the tree looking for
    /// the node holding `caller`; returns whether it was found. Duplicate
    /// arcs are silently coalesced.
    pub fn insert_call_graph(&mut self, caller: FuncId, callee: FuncId) -> bool {
        if self.proc == caller {
            self.insert_arc(callee);
            true
        } else {
            self.out_edges
                .iter_mut()
                .any(|edge| edge.insert_call_graph(caller, callee))
        }
    }

    /// Render the tree, one procedure per line, indented by call depth.
    pub fn write(&self, funcs: &[Function], out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(out, "Call Graph:")?;
        self.write_node(funcs, out, 0)
    }

    fn write_node(
        &self,
        funcs: &[Function],
        out: &mut impl fmt::Write,
        depth: usize,
    ) -> fmt::Result {
        let name = funcs.get(self.proc).map(|f| f.name.as_str()).unwrap_or("?");
        writeln!(out, "{}{}", indent_str(depth), name)?;
        for edge in &self.out_edges {
            edge.write_node(funcs, out, depth + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::MachineState;

    #[test]
    fn duplicate_arcs_coalesce() {
        let mut cg = CallGraph::new(0);
        assert!(cg.insert_call_graph(0, 1));
        assert!(cg.insert_call_graph(1, 2));
        assert!(cg.insert_call_graph(0, 1));
        assert!(cg.insert_call_graph(0, 2));

        let children: Vec<FuncId> = cg.callees().iter().map(CallGraph::proc).collect();
        assert_eq!(children, vec![1, 2]);
        let grand: Vec<FuncId> = cg.callees()[0].callees().iter().map(CallGraph::proc).collect();
        assert_eq!(grand, vec![2]);
    }

    #[test]
    fn unknown_caller_is_reported() {
        let mut cg = CallGraph::new(0);
        assert!(!cg.insert_call_graph(7, 1));
    }

    #[test]
    fn rendering_indents_by_depth() {
        let funcs = vec![
            Function::new("main", 0, MachineState::new()),
            Function::new("helper", 16, MachineState::new()),
        ];
        let mut cg = CallGraph::new(0);
        cg.insert_call_graph(0, 1);
        let mut out = String::new();
        cg.write(&funcs, &mut out).unwrap();
        assert_eq!(out, "Call Graph:\nmain\n    helper\n");
    }
}
