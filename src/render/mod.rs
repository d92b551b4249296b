//! DOT, SVG and PDF output of derivation graphs.

use std::path::Path;

use layout::backends::svg::SVGWriter;
use layout::gv::{DotParser, GraphBuilder};
use layout::topo::layout::VisualGraph;
use petgraph::dot::Dot;

use crate::derivation::DerivationGraph;
use crate::error::{Error, Result};

/// States labelled with their decoded terms, transitions with the rule
/// that produced them.
pub fn to_dot(dg: &DerivationGraph) -> String {
    let labelled = dg.labelled();
    Dot::with_config(&labelled, &[]).to_string()
}

pub fn render_to_svg(dot: &str) -> Result<String> {
    let mut parser = DotParser::new(dot);
    let tree = parser
        .process()
        .map_err(|e| Error::Render(format!("dot: {e}")))?;

    let mut gb = GraphBuilder::new();
    gb.visit_graph(&tree);
    let mut visual_graph = gb.get();
    Ok(generate_svg(&mut visual_graph))
}

fn generate_svg(graph: &mut VisualGraph) -> String {
    let mut svg = SVGWriter::new();
    graph.do_it(false, false, false, &mut svg);
    svg.finalize()
}

/// Writes `svg` as a PDF next to `output`, with a `.pdf` extension.
pub fn render_svg_to_pdf(svg: impl AsRef<str>, output: &Path) -> Result<()> {
    use svg2pdf::{ConversionOptions, PageOptions};

    let output = output.with_extension("pdf");

    let mut options = svg2pdf::usvg::Options::default();
    options.fontdb_mut().load_system_fonts();
    let tree = svg2pdf::usvg::Tree::from_str(svg.as_ref(), &options)
        .map_err(|e| Error::Render(format!("svg: {e}")))?;

    let pdf = svg2pdf::to_pdf(&tree, ConversionOptions::default(), PageOptions::default())
        .map_err(|e| Error::Render(format!("pdf: {e:?}")))?;
    std::fs::write(output, pdf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduction::{ExploreConfig, ReductionEngine};
    use crate::recursive::RecursiveProcessTable;
    use crate::term::Process;

    fn explored() -> DerivationGraph {
        let p = Process::new().input("x", "z").unwrap().output("z", "w").unwrap()
            | Process::new().output("x", "y").unwrap();
        let table = RecursiveProcessTable::new();
        ReductionEngine::new(&p, &table, ExploreConfig::default())
            .unwrap()
            .calc()
            .unwrap()
    }

    #[test]
    fn dot_carries_terms_and_rules() {
        let dot = to_dot(&explored());
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("out(y, w).0"));
        assert!(dot.contains("reduction"));
    }

    #[test]
    fn dot_lays_out_as_svg() {
        let svg = render_to_svg(&to_dot(&explored())).unwrap();
        assert!(svg.contains("<svg"));
    }
}
