//! OWL-in-Turtle encoder.
//!
//! Layout, in order: prefixes, ontology header, property declarations, class
//! declarations, edges, annotations. Within each section the graph's
//! insertion order is kept, so the same graph always encodes to the same
//! bytes.

use crate::graph::{AnnotationValue, Edge, Literal, OntologyGraph, PropertyKind};
use crate::iri::STANDARD_PREFIXES;
use crate::sink::{DocumentSink, SinkError};
use std::io::Write;

pub struct TurtleSink<W: Write> {
    out: W,
}

impl<W: Write> TurtleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Render `iri` as a prefixed name when the local part is plain, else `<iri>`.
fn term(graph: &OntologyGraph, iri: &str) -> String {
    let ns = graph.namespace();
    if let Some(local) = ns.local_part(iri) {
        if is_plain_local(local) {
            return format!("{}:{}", ns.prefix(), local);
        }
    }
    for (prefix, base) in STANDARD_PREFIXES {
        if let Some(local) = iri.strip_prefix(base) {
            if is_plain_local(local) {
                return format!("{prefix}:{local}");
            }
        }
    }
    format!("<{iri}>")
}

fn is_plain_local(local: &str) -> bool {
    !local.is_empty()
        && !local.starts_with('-')
        && local
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

fn literal(lit: &Literal) -> String {
    match &lit.language {
        Some(lang) => format!("\"{}\"@{}", escape_string(&lit.lexical), lang),
        None => format!("\"{}\"", escape_string(&lit.lexical)),
    }
}

impl<W: Write> DocumentSink for TurtleSink<W> {
    fn write_document(&mut self, graph: &OntologyGraph) -> Result<(), SinkError> {
        let ns = graph.namespace();
        let out = &mut self.out;

        for (prefix, base) in STANDARD_PREFIXES {
            writeln!(out, "@prefix {prefix}: <{base}> .")?;
        }
        writeln!(out, "@prefix {}: <{}> .", ns.prefix(), ns.iri())?;
        writeln!(out)?;
        writeln!(out, "<{}> rdf:type owl:Ontology .", ns.ontology_iri())?;
        writeln!(out)?;

        for (_, decl) in graph.properties() {
            if decl.builtin {
                continue;
            }
            let kind = match decl.kind {
                PropertyKind::Object => "owl:ObjectProperty",
                PropertyKind::Annotation => "owl:AnnotationProperty",
            };
            writeln!(out, "{} rdf:type {kind} .", term(graph, &decl.iri))?;
        }
        writeln!(out)?;

        for (_, iri) in graph.nodes() {
            writeln!(out, "{} rdf:type owl:Class .", term(graph, iri))?;
        }
        writeln!(out)?;

        for edge in graph.edges() {
            match edge {
                Edge::SubClassOf { sub, sup } => writeln!(
                    out,
                    "{} rdfs:subClassOf {} .",
                    term(graph, graph.iri(*sub)),
                    term(graph, graph.iri(*sup))
                )?,
                Edge::SomeValuesFrom {
                    sub,
                    property,
                    filler,
                } => writeln!(
                    out,
                    "{} rdfs:subClassOf [ rdf:type owl:Restriction ; owl:onProperty {} ; owl:someValuesFrom {} ] .",
                    term(graph, graph.iri(*sub)),
                    term(graph, &graph.property(*property).iri),
                    term(graph, graph.iri(*filler))
                )?,
            }
        }
        writeln!(out)?;

        for ann in graph.annotations() {
            let object = match &ann.value {
                AnnotationValue::Literal(lit) => literal(lit),
                AnnotationValue::Node(node) => term(graph, graph.iri(*node)),
            };
            writeln!(
                out,
                "{} {} {object} .",
                term(graph, graph.iri(ann.subject)),
                term(graph, &graph.property(ann.property).iri)
            )?;
        }

        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Literal;
    use crate::iri::Namespace;
    use sophia::api::prelude::*;

    fn sample() -> OntologyGraph {
        let ns = Namespace::new("https://example.org/omop#", "omop").unwrap();
        let mut g = OntologyGraph::new(ns.clone());
        let root = g.class(&ns.category_iri("domain"));
        let dom = g.class(&ns.reference_iri("domain", "Condition"));
        let parent = g.class(&ns.concept_iri("1"));
        let child = g.class(&ns.concept_iri("2"));
        let in_domain = g.object_property("in_domain").unwrap();
        let has_code = g.annotation_property("has_code").unwrap();

        g.add_subclass(dom, root);
        g.add_subclass(child, parent);
        g.add_some_values_from(child, in_domain, dom);
        g.add_label(child, "Say \"hi\"\nnow", Some("en"));
        g.annotate_literal(child, has_code, Literal::plain("snomed:44.1"));
        g.annotate(child, g.exact_match_property(), AnnotationValue::Node(parent));
        g
    }

    fn encode(graph: &OntologyGraph) -> String {
        let mut sink = TurtleSink::new(Vec::new());
        sink.write_document(graph).unwrap();
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn uses_prefixed_names_where_possible() {
        let text = encode(&sample());
        assert!(text.contains("@prefix omop: <https://example.org/omop#> ."));
        assert!(text.contains("omop:2 rdfs:subClassOf omop:1 ."));
        assert!(text.contains("<https://example.org/omop#domain/Condition> rdfs:subClassOf omop:domain ."));
        assert!(text.contains("omop:in_domain rdf:type owl:ObjectProperty ."));
        assert!(text.contains("skos:altLabel rdf:type owl:AnnotationProperty ."));
        assert!(!text.contains("rdfs:label rdf:type"));
        assert!(text.contains("omop:2 skos:exactMatch omop:1 ."));
        assert!(text.contains("omop:2 omop:has_code \"snomed:44.1\" ."));
    }

    #[test]
    fn escapes_literals() {
        let text = encode(&sample());
        assert!(text.contains(r#"omop:2 rdfs:label "Say \"hi\"\nnow"@en ."#));
    }

    #[test]
    fn encoding_is_deterministic() {
        assert_eq!(encode(&sample()), encode(&sample()));
    }

    #[test]
    fn output_parses_as_turtle() {
        let text = encode(&sample());
        let reader = std::io::BufReader::new(std::io::Cursor::new(text.as_bytes()));
        let mut parser = sophia::turtle::parser::turtle::parse_bufread(reader);
        let mut triples = 0usize;
        parser
            .try_for_each_triple(|_t| -> Result<(), std::convert::Infallible> {
                triples += 1;
                Ok(())
            })
            .expect("emitted document should be valid Turtle");

        // 1 ontology header + 4 property decls + 4 classes + 1 subclass edge
        // x2 + 1 restriction edge (4 triples) + 3 annotations.
        assert_eq!(triples, 1 + 4 + 4 + 2 + 4 + 3);
    }
}
