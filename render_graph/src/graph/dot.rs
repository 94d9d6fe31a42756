//! Graphviz export of a render graph.

use std::path::Path;

use crate::profile_function;

use super::RenderGraph;
use super::resource_usage::UsageTarget;
use super::state::PassKind;

fn pass_color(kind: PassKind) -> &'static str {
    match kind {
        PassKind::Graphics => "lightblue",
        PassKind::Compute => "palegreen",
        PassKind::Copy => "khaki",
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

fn resource_node(target: UsageTarget) -> String {
    match target {
        UsageTarget::Texture { index, .. } => format!("t{index}"),
        UsageTarget::Buffer { index, .. } => format!("b{index}"),
    }
}

impl RenderGraph<'_> {
    /// Describe the graph in Graphviz DOT syntax.
    ///
    /// Passes are boxes colored by kind, culled passes dashed. Textures are
    /// ellipses and buffers cylinders; imported resources get a double
    /// border and resources placed in an aliased heap a red one. Edges run
    /// from writers to resources and from resources to readers. A legend
    /// cluster explains the colors.
    ///
    /// Culling state is only meaningful after [`compile`](Self::compile).
    pub fn to_dot(&self) -> String {
        profile_function!();
        let mut dot = String::from("digraph render_graph {\n");
        dot.push_str("  rankdir=LR;\n");
        dot.push_str("  node [fontname=\"Helvetica\"];\n\n");

        for (index, pass) in self.passes.iter().enumerate() {
            let style = if pass.is_culled() {
                "filled,dashed"
            } else {
                "filled"
            };
            dot.push_str(&format!(
                "  p{index} [label=\"{}\\n({})\", shape=box, style=\"{style}\", fillcolor={}];\n",
                escape(pass.name()),
                pass.kind(),
                pass_color(pass.kind())
            ));
        }
        dot.push('\n');

        for (index, texture) in self.registry.textures().iter().enumerate() {
            let mut label = escape(texture.name());
            let mut attributes =
                String::from("shape=ellipse, style=filled, fillcolor=lightsalmon");
            if texture.is_imported() {
                label.push_str("\\n(imported)");
                attributes.push_str(", peripheries=2");
            }
            if let Some(heap) = texture.aliased_heap() {
                label.push_str(&format!("\\nheap {heap}"));
                attributes.push_str(", color=red");
            }
            if let Some(state) = texture.export_state() {
                label.push_str(&format!("\\nexport {state}"));
            }
            dot.push_str(&format!("  t{index} [label=\"{label}\", {attributes}];\n"));
        }
        for (index, buffer) in self.registry.buffers().iter().enumerate() {
            let mut label = format!("{}\\n{} bytes", escape(buffer.name()), buffer.size());
            let mut attributes = String::from("shape=cylinder, style=filled, fillcolor=plum");
            if buffer.is_imported() {
                label.push_str("\\n(imported)");
                attributes.push_str(", peripheries=2");
            }
            if let Some(heap) = buffer.aliased_heap() {
                label.push_str(&format!("\\nheap {heap}"));
                attributes.push_str(", color=red");
            }
            if let Some(state) = buffer.export_state() {
                label.push_str(&format!("\\nexport {state}"));
            }
            dot.push_str(&format!("  b{index} [label=\"{label}\", {attributes}];\n"));
        }
        dot.push('\n');

        for (index, pass) in self.passes.iter().enumerate() {
            let mut edges: Vec<String> = Vec::new();
            for usage in pass.usages() {
                let resource = resource_node(usage.target);
                if usage.access.writes() {
                    edges.push(format!("  p{index} -> {resource};\n"));
                }
                if usage.access.reads() {
                    edges.push(format!("  {resource} -> p{index};\n"));
                }
            }
            let mut seen: Vec<&String> = Vec::with_capacity(edges.len());
            for edge in &edges {
                if !seen.contains(&edge) {
                    seen.push(edge);
                    dot.push_str(edge);
                }
            }
        }

        dot.push_str("\n  subgraph cluster_legend {\n");
        dot.push_str("    label=\"Legend\";\n");
        for kind in [PassKind::Graphics, PassKind::Compute, PassKind::Copy] {
            dot.push_str(&format!(
                "    legend_{kind} [label=\"{kind} pass\", shape=box, style=filled, \
                 fillcolor={}];\n",
                pass_color(kind)
            ));
        }
        dot.push_str(
            "    legend_culled [label=\"culled pass\", shape=box, style=\"filled,dashed\"];\n",
        );
        dot.push_str(
            "    legend_texture [label=\"texture\", shape=ellipse, style=filled, \
             fillcolor=lightsalmon];\n",
        );
        dot.push_str(
            "    legend_buffer [label=\"buffer\", shape=cylinder, style=filled, fillcolor=plum];\n",
        );
        dot.push_str("    legend_imported [label=\"imported\", peripheries=2];\n");
        dot.push_str("    legend_aliased [label=\"aliased heap\", color=red];\n");
        dot.push_str("  }\n");

        dot.push_str("}\n");
        dot
    }

    /// Write [`to_dot`](Self::to_dot) to `path`.
    pub fn write_dot(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        std::fs::write(path, self.to_dot())
    }
}
