//! UPPAAL XML interchange writer.
//!
//! The oracle's compiler reads the same XML format as the editor. Only the
//! semantic content is written: no layout coordinates and no embedded
//! queries.

use std::fmt::Write;

use crate::decl::{Declaration, Declarations};
use crate::network::{LocationKind, Network, Template};

/// Functions the oracle's compiler declares on its own. A zero-length body
/// with one of these names is a stub the compiler injected into a document it
/// returned, and it must not be handed back to the compiler.
pub const BUILTIN_FUNCTIONS: &[&str] = &[
    "abs", "fabs", "fmod", "fma", "fmax", "fmin", "exp", "exp2", "expm1", "ln", "log", "log10", "log2", "log1p",
    "pow", "sqrt", "cbrt", "hypot", "sin", "cos", "tan", "asin", "acos", "atan", "atan2", "sinh", "cosh", "tanh",
    "asinh", "acosh", "atanh", "erf", "erfc", "tgamma", "lgamma", "ceil", "floor", "trunc", "round", "fint",
    "ldexp", "ilogb", "logb", "nextafter", "copysign", "signbit", "random", "random_arcsine", "random_beta",
    "random_gamma", "random_normal", "random_poisson", "random_weibull", "random_tri",
];

fn is_builtin_stub(declaration: &Declaration) -> bool {
    matches!(declaration, Declaration::Function(f) if f.is_stub() && BUILTIN_FUNCTIONS.contains(&f.name.as_str()))
}

/// Removes compiler-injected builtin stubs at every scope. Returns how many
/// were removed.
pub fn strip_builtin_stubs(network: &mut Network) -> usize {
    let mut removed = strip(&mut network.declarations);
    for template in network.templates_mut() {
        removed += strip(&mut template.declarations);
    }
    removed
}

fn strip(declarations: &mut Declarations) -> usize {
    declarations.remove_functions(|f| f.is_stub() && BUILTIN_FUNCTIONS.contains(&f.name.as_str()))
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn declarations_text(declarations: &Declarations) -> String {
    let mut text = String::new();
    for d in declarations.iter().filter(|d| !is_builtin_stub(d)) {
        let _ = writeln!(text, "{}", d);
    }
    text
}

/// Renders the global declarations, channel priority included.
pub fn global_declarations(network: &Network) -> String {
    let mut text = declarations_text(&network.declarations);
    if let Some(priority) = &network.channel_priority {
        let _ = writeln!(text, "{}", priority);
    }
    text
}

/// Renders the system declarations: partial instantiations and the
/// `system` line.
pub fn system_declarations(network: &Network) -> String {
    let mut text = String::new();
    for inst in &network.system.instantiations {
        let params: Vec<String> = inst.parameters.iter().map(|p| p.to_string()).collect();
        let args: Vec<String> = inst.arguments.iter().map(|a| a.to_string()).collect();
        if params.is_empty() {
            let _ = writeln!(text, "{} = {}({});", inst.name, inst.template, args.join(", "));
        } else {
            let _ = writeln!(
                text,
                "{}({}) = {}({});",
                inst.name,
                params.join(", "),
                inst.template,
                args.join(", ")
            );
        }
    }
    let groups: Vec<String> = network.system.processes.iter().map(|g| g.join(", ")).collect();
    let _ = writeln!(text, "system {};", groups.join(" < "));
    text
}

fn location_id(template: usize, location: usize) -> String {
    format!("id{}_{}", template, location)
}

fn label(out: &mut String, kind: &str, text: &str) {
    let _ = writeln!(out, "\t\t\t<label kind=\"{}\">{}</label>", kind, escape(text));
}

fn write_template(out: &mut String, t: usize, template: &Template) {
    let _ = writeln!(out, "\t<template>");
    let _ = writeln!(out, "\t\t<name>{}</name>", escape(&template.name));
    if !template.parameters.is_empty() {
        let params: Vec<String> = template.parameters.iter().map(|p| p.to_string()).collect();
        let _ = writeln!(out, "\t\t<parameter>{}</parameter>", escape(&params.join(", ")));
    }
    if !template.declarations.is_empty() {
        let _ = writeln!(
            out,
            "\t\t<declaration>{}</declaration>",
            escape(&declarations_text(&template.declarations))
        );
    }

    // Branchpoints must follow all locations.
    for (id, location) in template.locations().filter(|(_, l)| !l.is_chance()) {
        let _ = writeln!(out, "\t\t<location id=\"{}\">", location_id(t, id.index()));
        let _ = writeln!(out, "\t\t\t<name>{}</name>", escape(&location.name));
        if let Some(invariant) = &location.invariant {
            label(out, "invariant", &invariant.to_string());
        }
        if let Some(rate) = &location.rate {
            label(out, "exponentialrate", &rate.to_string());
        }
        match location.kind {
            LocationKind::Urgent => {
                let _ = writeln!(out, "\t\t\t<urgent/>");
            }
            LocationKind::Committed => {
                let _ = writeln!(out, "\t\t\t<committed/>");
            }
            LocationKind::Normal | LocationKind::Chance => {}
        }
        let _ = writeln!(out, "\t\t</location>");
    }
    for (id, _) in template.locations().filter(|(_, l)| l.is_chance()) {
        let _ = writeln!(out, "\t\t<branchpoint id=\"{}\"/>", location_id(t, id.index()));
    }
    if let Some(initial) = template.initial {
        let _ = writeln!(out, "\t\t<init ref=\"{}\"/>", location_id(t, initial.index()));
    }

    for (_, edge) in template.edges() {
        let _ = writeln!(out, "\t\t<transition>");
        let _ = writeln!(out, "\t\t\t<source ref=\"{}\"/>", location_id(t, edge.source.index()));
        let _ = writeln!(out, "\t\t\t<target ref=\"{}\"/>", location_id(t, edge.target.index()));
        if !edge.selects.is_empty() {
            let selects: Vec<String> = edge.selects.iter().map(|s| format!("{} : {}", s.name, s.ty)).collect();
            label(out, "select", &selects.join(", "));
        }
        if let Some(guard) = &edge.guard {
            label(out, "guard", &guard.to_string());
        }
        if let Some(sync) = &edge.sync {
            label(out, "synchronisation", &sync.to_string());
        }
        if !edge.updates.is_empty() {
            let updates: Vec<String> = edge.updates.iter().map(|u| u.to_string()).collect();
            label(out, "assignment", &updates.join(", "));
        }
        if let Some(weight) = &edge.weight {
            label(out, "probability", &weight.to_string());
        }
        let _ = writeln!(out, "\t\t</transition>");
    }
    let _ = writeln!(out, "\t</template>");
}

/// Renders `network` as an UPPAAL XML document.
pub fn to_xml(network: &Network) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "<?xml version=\"1.0\" encoding=\"utf-8\"?>");
    let _ = writeln!(out, "<nta>");
    let _ = writeln!(out, "\t<declaration>{}</declaration>", escape(&global_declarations(network)));
    for (id, template) in network.templates() {
        write_template(&mut out, id.index(), template);
    }
    let _ = writeln!(out, "\t<system>{}</system>", escape(&system_declarations(network)));
    let _ = writeln!(out, "</nta>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::decl::{FunctionDecl, Type, Variable};
    use crate::expr::{CompareOp, Expr};
    use crate::network::{Edge, Location, Sync};

    use test_log::test;

    fn stub(name: &str) -> FunctionDecl {
        FunctionDecl {
            return_type: "double".to_string(),
            name: name.to_string(),
            params: Vec::new(),
            body: "{\n}".to_string(),
        }
    }

    fn sample() -> Network {
        let mut network = Network::default();
        network.add_global_variable(Type::int(), Variable::new("x").with_init(Expr::int(0)));
        network.add_global_channel("a", false, true);
        let mut p = Template::new("P");
        let idle = p.add_location(Location::new("Idle").with_invariant(Expr::compare(
            CompareOp::Le,
            Expr::ident("x"),
            Expr::int(10),
        )));
        let c = p.add_location(Location::chance("Branch"));
        let done = p.add_location(Location::new("Done").committed());
        p.set_initial(idle);
        p.add_edge(
            Edge::new(idle, c)
                .with_guard(Expr::compare(CompareOp::Gt, Expr::ident("x"), Expr::int(5)))
                .with_sync(Sync::send("a")),
        );
        p.add_edge(Edge::new(c, done).with_weight(Expr::int(3)).with_update(Expr::post_inc(Expr::ident("x"))));
        network.add_template(p);
        network.instantiate("P");
        network
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("x < 5 && y > 1"), "x &lt; 5 &amp;&amp; y &gt; 1");
    }

    #[test]
    fn test_to_xml_structure() {
        let xml = to_xml(&sample());
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<nta>\n"));
        assert!(xml.contains("<declaration>int x = 0;\nbroadcast chan a;\n</declaration>"));
        assert!(xml.contains("<label kind=\"invariant\">x &lt;= 10</label>"));
        assert!(xml.contains("<label kind=\"guard\">x &gt; 5</label>"));
        assert!(xml.contains("<label kind=\"synchronisation\">a!</label>"));
        assert!(xml.contains("<label kind=\"probability\">3</label>"));
        assert!(xml.contains("<label kind=\"assignment\">x++</label>"));
        assert!(xml.contains("<branchpoint id=\"id0_1\"/>"));
        assert!(xml.contains("<committed/>"));
        assert!(xml.contains("<init ref=\"id0_0\"/>"));
        assert!(xml.contains("<system>system P;\n</system>"));

        let done = xml.find("<name>Done</name>").unwrap();
        let branch = xml.find("<branchpoint").unwrap();
        assert!(done < branch);
    }

    #[test]
    fn test_builtin_stubs_are_skipped() {
        let mut network = sample();
        network.add_global_function(stub("sin"));
        network.add_global_function(FunctionDecl {
            body: "{ return 1.0; }".to_string(),
            ..stub("sin")
        });
        network.add_global_function(stub("mine"));
        let decls = global_declarations(&network);
        assert!(!decls.contains("sin()\n{\n}"));
        assert!(decls.contains("double sin()\n{ return 1.0; }"));
        assert!(decls.contains("double mine()\n{\n}"));

        assert_eq!(strip_builtin_stubs(&mut network), 1);
        assert_eq!(strip_builtin_stubs(&mut network), 0);
    }

    #[test]
    fn test_system_with_partial_instantiation() {
        let mut network = sample();
        network.system.instantiations.push(crate::network::Instantiation {
            name: "Q".to_string(),
            parameters: vec![crate::decl::Parameter::new(
                Type::bounded_int(Expr::int(0), Expr::int(1)).constant(),
                "i",
            )],
            template: "P".to_string(),
            arguments: Vec::new(),
        });
        network.system.processes.push(vec!["Q".to_string()]);
        assert_eq!(system_declarations(&network), "Q(const int[0,1] i) = P();\nsystem P < Q;\n");
    }
}
