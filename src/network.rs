//! # Automaton network model
//!
//! A [`Network`] is a parallel composition of [`Template`]s sharing global
//! [`Declarations`]. It is a plain data container: all transformation logic
//! lives in [`abstraction`][crate::abstraction],
//! [`instrument`][crate::instrument] and [`property`][crate::property].
//!
//! ## Arena layout
//!
//! Templates own their locations and edges in two vectors. Edges refer to
//! their endpoints by [`LocationId`], and network-wide references to an edge
//! use [`EdgeRef`]. Nothing is ever removed from an arena, so ids handed out
//! before an instrumentation step are still valid after it.
//!
//! ## Cloning
//!
//! [`Clone`] produces a fully independent network: every expression is owned
//! by exactly one location, edge or declaration, and there is no shared
//! state between a network and its clone. Every property check starts by
//! cloning the base network, which is what keeps checks from observing each
//! other's instrumentation.
//!
//! ```
//! use nsta_rs::expr::{CompareOp, Expr};
//! use nsta_rs::network::{Edge, Location, Network, Template};
//!
//! let mut p = Template::new("P");
//! let idle = p.add_location(Location::new("Idle"));
//! let done = p.add_location(Location::new("Done"));
//! p.set_initial(idle);
//! p.add_edge(Edge::new(idle, done).with_guard(Expr::compare(CompareOp::Gt, Expr::ident("x"), Expr::int(5))));
//!
//! let mut network = Network::default();
//! network.add_template(p);
//! network.instantiate("P");
//!
//! let copy = network.clone();
//! network.instantiate("Q");
//! assert_ne!(network, copy);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::decl::{BaseType, ChannelPriority, Declarations, FunctionDecl, Initializer, Parameter, Type, Variable};
use crate::error::Problem;
use crate::eval::{Eval, Value};
use crate::expr::Expr;
use crate::types::{EdgeId, EdgeRef, LocationId, TemplateId};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationKind {
    #[default]
    Normal,
    Urgent,
    Committed,
    /// Outgoing edges form a discrete probability distribution.
    Chance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(default)]
    pub kind: LocationKind,
    #[serde(default)]
    pub invariant: Option<Expr>,
    /// Exponential rate used when leaving the location is not forced.
    #[serde(default)]
    pub rate: Option<Expr>,
}

impl Location {
    pub fn new(name: impl Into<String>) -> Self {
        Location {
            name: name.into(),
            kind: LocationKind::Normal,
            invariant: None,
            rate: None,
        }
    }

    pub fn chance(name: impl Into<String>) -> Self {
        Location {
            kind: LocationKind::Chance,
            ..Location::new(name)
        }
    }

    pub fn committed(mut self) -> Self {
        self.kind = LocationKind::Committed;
        self
    }

    pub fn urgent(mut self) -> Self {
        self.kind = LocationKind::Urgent;
        self
    }

    pub fn with_invariant(mut self, invariant: Expr) -> Self {
        self.invariant = Some(invariant);
        self
    }

    pub fn with_rate(mut self, rate: Expr) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn is_chance(&self) -> bool {
        self.kind == LocationKind::Chance
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncKind {
    Send,
    Receive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sync {
    /// The channel expression, possibly indexed (`c[i]`).
    pub channel: Expr,
    pub kind: SyncKind,
}

impl Sync {
    pub fn send(channel: impl Into<String>) -> Self {
        Sync {
            channel: Expr::ident(channel),
            kind: SyncKind::Send,
        }
    }

    pub fn receive(channel: impl Into<String>) -> Self {
        Sync {
            channel: Expr::ident(channel),
            kind: SyncKind::Receive,
        }
    }

    /// Whether this synchronizes on the channel named `name`, ignoring
    /// indices.
    pub fn is_on(&self, name: &str) -> bool {
        self.channel.base_name() == Some(name) || self.channel.to_string() == name
    }
}

impl std::fmt::Display for Sync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mark = match self.kind {
            SyncKind::Send => '!',
            SyncKind::Receive => '?',
        };
        write!(f, "{}{}", self.channel, mark)
    }
}

/// A non-deterministic binding `name : type` on an edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Select {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: LocationId,
    pub target: LocationId,
    #[serde(default)]
    pub selects: Vec<Select>,
    #[serde(default)]
    pub guard: Option<Expr>,
    #[serde(default)]
    pub sync: Option<Sync>,
    /// Applied atomically, in order, when the edge fires.
    #[serde(default)]
    pub updates: Vec<Expr>,
    /// Selection weight; only meaningful on chance edges.
    #[serde(default)]
    pub weight: Option<Expr>,
}

impl Edge {
    pub fn new(source: LocationId, target: LocationId) -> Self {
        Edge {
            source,
            target,
            selects: Vec::new(),
            guard: None,
            sync: None,
            updates: Vec::new(),
            weight: None,
        }
    }

    pub fn with_guard(mut self, guard: Expr) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_sync(mut self, sync: Sync) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn with_update(mut self, update: Expr) -> Self {
        self.updates.push(update);
        self
    }

    pub fn with_weight(mut self, weight: Expr) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_select(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.selects.push(Select { name: name.into(), ty });
        self
    }

    /// Conjoins `extra` onto the guard.
    pub fn constrain(&mut self, extra: Expr) {
        self.guard = Some(Expr::conjoin(self.guard.take(), extra));
    }

    pub fn is_receive(&self) -> bool {
        matches!(&self.sync, Some(Sync { kind: SyncKind::Receive, .. }))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub declarations: Declarations,
    locations: Vec<Location>,
    #[serde(default)]
    edges: Vec<Edge>,
    pub initial: Option<LocationId>,
}

impl Template {
    pub fn new(name: impl Into<String>) -> Self {
        Template {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_location(&mut self, location: Location) -> LocationId {
        let id = LocationId::new(self.locations.len());
        self.locations.push(location);
        id
    }

    pub fn set_initial(&mut self, id: LocationId) {
        assert!(id.index() < self.locations.len(), "initial location {} out of range", id);
        self.initial = Some(id);
    }

    /// Adds an edge between two locations of this template.
    ///
    /// # Panics
    ///
    /// Panics if either endpoint was not issued by this template.
    pub fn add_edge(&mut self, edge: Edge) -> EdgeId {
        assert!(edge.source.index() < self.locations.len(), "edge source {} out of range", edge.source);
        assert!(edge.target.index() < self.locations.len(), "edge target {} out of range", edge.target);
        let id = EdgeId::new(self.edges.len());
        self.edges.push(edge);
        id
    }

    pub fn location(&self, id: LocationId) -> &Location {
        &self.locations[id.index()]
    }

    pub fn location_mut(&mut self, id: LocationId) -> &mut Location {
        &mut self.locations[id.index()]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> &mut Edge {
        &mut self.edges[id.index()]
    }

    pub fn locations(&self) -> impl Iterator<Item = (LocationId, &Location)> {
        self.locations.iter().enumerate().map(|(i, l)| (LocationId::new(i), l))
    }

    pub fn locations_mut(&mut self) -> impl Iterator<Item = &mut Location> {
        self.locations.iter_mut()
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter().enumerate().map(|(i, e)| (EdgeId::new(i), e))
    }

    pub fn edges_mut(&mut self) -> impl Iterator<Item = &mut Edge> {
        self.edges.iter_mut()
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn find_location(&self, name: &str) -> Option<LocationId> {
        self.locations.iter().position(|l| l.name == name).map(LocationId::new)
    }

    pub fn is_chance(&self, id: LocationId) -> bool {
        self.location(id).is_chance()
    }

    /// An edge leaving a chance node.
    pub fn is_chance_edge(&self, edge: &Edge) -> bool {
        self.is_chance(edge.source)
    }
}

/// A partial instantiation `Name(params) = Template(args);`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instantiation {
    pub name: String,
    /// Parameters left free; bounded ones expand to one process per value.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub template: String,
    #[serde(default)]
    pub arguments: Vec<Expr>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct System {
    #[serde(default)]
    pub instantiations: Vec<Instantiation>,
    /// The `system` line; groups are separated by `<` (process priority),
    /// lowest first.
    #[serde(default)]
    pub processes: Vec<Vec<String>>,
}

impl System {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.processes.iter().flatten().map(|s| s.as_str())
    }

    fn instantiation(&self, name: &str) -> Option<&Instantiation> {
        self.instantiations.iter().find(|i| i.name == name)
    }
}

/// A process of the expanded system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    /// Process name as the oracle reports it, e.g. `P` or `P(1)`.
    pub name: String,
    pub template: TemplateId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    #[serde(default)]
    pub declarations: Declarations,
    #[serde(default)]
    pub channel_priority: Option<ChannelPriority>,
    templates: Vec<Template>,
    #[serde(default)]
    pub system: System,
}

impl Network {
    pub fn add_template(&mut self, template: Template) -> TemplateId {
        let id = TemplateId::new(self.templates.len());
        self.templates.push(template);
        id
    }

    pub fn template(&self, id: TemplateId) -> &Template {
        &self.templates[id.index()]
    }

    pub fn template_mut(&mut self, id: TemplateId) -> &mut Template {
        &mut self.templates[id.index()]
    }

    pub fn templates(&self) -> impl Iterator<Item = (TemplateId, &Template)> {
        self.templates.iter().enumerate().map(|(i, t)| (TemplateId::new(i), t))
    }

    pub fn templates_mut(&mut self) -> impl Iterator<Item = &mut Template> {
        self.templates.iter_mut()
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    pub fn template_by_name(&self, name: &str) -> Option<TemplateId> {
        self.templates.iter().position(|t| t.name == name).map(TemplateId::new)
    }

    pub fn find_location(&self, template: &str, location: &str) -> Option<(TemplateId, LocationId)> {
        let t = self.template_by_name(template)?;
        let l = self.template(t).find_location(location)?;
        Some((t, l))
    }

    pub fn edge(&self, edge: EdgeRef) -> &Edge {
        self.template(edge.template).edge(edge.edge)
    }

    pub fn edge_mut(&mut self, edge: EdgeRef) -> &mut Edge {
        self.template_mut(edge.template).edge_mut(edge.edge)
    }

    /// Every edge of every template, in arena order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeRef, &Edge)> {
        self.templates()
            .flat_map(|(t, template)| template.edges().map(move |(e, edge)| (EdgeRef::new(t, e), edge)))
    }

    /// Total number of locations over all templates, chance nodes included.
    pub fn location_count(&self) -> usize {
        self.templates.iter().map(|t| t.location_count()).sum()
    }

    pub fn find_variable(&self, name: &str) -> Option<(&Type, &Variable)> {
        self.declarations.find_variable(name)
    }

    /// Looks up a global channel declaration.
    pub fn find_channel(&self, name: &str) -> Option<&Type> {
        self.find_variable(name).map(|(ty, _)| ty).filter(|ty| ty.is_chan())
    }

    pub fn add_global_variable(&mut self, ty: Type, variable: Variable) {
        self.declarations.add_variable(ty, variable);
    }

    pub fn add_global_channel(&mut self, name: impl Into<String>, urgent: bool, broadcast: bool) {
        self.declarations.add_channel(name, urgent, broadcast);
    }

    pub fn add_global_function(&mut self, function: FunctionDecl) {
        self.declarations.add_function(function);
    }

    /// Adds `name` to the last group of the `system` line.
    pub fn instantiate(&mut self, name: impl Into<String>) {
        match self.system.processes.last_mut() {
            Some(group) => group.push(name.into()),
            None => self.system.processes.push(vec![name.into()]),
        }
    }

    /// Rewrites the initializer of a global or template-local constant.
    /// Returns `false` if no constant of that name exists.
    pub fn set_constant(&mut self, name: &str, literal: &str) -> bool {
        let mut found = self.declarations.set_constant(name, literal);
        for template in &mut self.templates {
            found |= template.declarations.set_constant(name, literal);
        }
        found
    }

    /// Values of the global scalar constants, folded in declaration order.
    /// Constants whose initializer cannot be folded are skipped.
    pub fn constants(&self) -> BTreeMap<String, Value> {
        let mut env = BTreeMap::new();
        for (ty, var) in self.declarations.variables() {
            if !ty.qualifiers.constant || !var.dims.is_empty() {
                continue;
            }
            if let Some(Initializer::Expr(init)) = &var.init {
                if let Ok(value) = init.eval(&env) {
                    env.insert(var.name.clone(), value);
                }
            }
        }
        env
    }

    /// Expands the `system` line into processes.
    ///
    /// An entry naming a partial instantiation or a template whose free
    /// parameters are all bounded integers yields one process per parameter
    /// valuation, named `P(0)`, `P(1)`, ... An entry without free parameters
    /// yields a single process carrying the entry's name.
    pub fn processes(&self) -> Result<Vec<Process>, Vec<Problem>> {
        let constants = self.constants();
        let mut processes = Vec::new();
        let mut problems = Vec::new();
        for name in self.system.names() {
            let inst = self.system.instantiation(name);
            let template_name = inst.map_or(name, |i| i.template.as_str());
            let Some(template) = self.template_by_name(template_name) else {
                problems.push(Problem::error("system", format!("unknown process or template `{}`", name)));
                continue;
            };
            let free: &[Parameter] = match inst {
                Some(inst) => &inst.parameters,
                None => &self.template(template).parameters,
            };

            let mut ranges = Vec::new();
            for param in free {
                match self.bounds(&param.ty, &constants) {
                    Some(range) if !param.by_ref => ranges.push(range),
                    _ => problems.push(Problem::error(
                        format!("system/{}", name),
                        format!("parameter `{}` is not a bounded integer", param.name),
                    )),
                }
            }

            if ranges.is_empty() {
                processes.push(Process {
                    name: name.to_string(),
                    template,
                });
                continue;
            }
            for values in cartesian(&ranges) {
                let args: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                processes.push(Process {
                    name: format!("{}({})", name, args.join(",")),
                    template,
                });
            }
        }
        if problems.is_empty() {
            Ok(processes)
        } else {
            Err(problems)
        }
    }

    /// Resolves `int[a,b]` or a typedef of one to its inclusive bounds.
    fn bounds(&self, ty: &Type, constants: &BTreeMap<String, Value>) -> Option<(i64, i64)> {
        match &ty.base {
            BaseType::Int { range: Some((lo, hi)) } => {
                let lo = lo.eval(constants).ok()?.as_int().ok()?;
                let hi = hi.eval(constants).ok()?.as_int().ok()?;
                Some((lo, hi))
            }
            BaseType::Named(name) => {
                let typedef = self.declarations.find_typedef(name)?;
                self.bounds(&typedef.ty, constants)
            }
            _ => None,
        }
    }

    /// Reports structural problems. An empty result means the network is
    /// well-formed as far as this crate can tell; the oracle's compiler may
    /// still reject it.
    pub fn validate(&self) -> Vec<Problem> {
        let mut problems = Vec::new();
        let global_names: BTreeSet<&str> = self.declarations.names();

        for (_, template) in self.templates() {
            let path = format!("template {}", template.name);
            match template.initial {
                None => problems.push(Problem::error(&path, "no initial location")),
                Some(id) if id.index() >= template.location_count() => {
                    problems.push(Problem::error(&path, format!("initial location {} does not exist", id)))
                }
                Some(_) => {}
            }

            let mut scope = global_names.clone();
            scope.extend(template.declarations.names());
            scope.extend(template.parameters.iter().map(|p| p.name.as_str()));

            for (id, location) in template.locations() {
                let lpath = format!("{}/location {}", path, location.name);
                for (label, expr) in [("invariant", &location.invariant), ("rate", &location.rate)] {
                    if let Some(expr) = expr {
                        unresolved(expr, &scope, &format!("{}/{}", lpath, label), &mut problems);
                    }
                }
                if location.is_chance() && template.initial == Some(id) {
                    problems.push(Problem::error(&lpath, "a chance node cannot be initial"));
                }
            }

            for (id, edge) in template.edges() {
                let epath = format!("{}/edge {}", path, id.index());
                let mut edge_scope = scope.clone();
                edge_scope.extend(edge.selects.iter().map(|s| s.name.as_str()));

                if let Some(guard) = &edge.guard {
                    unresolved(guard, &edge_scope, &format!("{}/guard", epath), &mut problems);
                }
                if let Some(sync) = &edge.sync {
                    unresolved(&sync.channel, &edge_scope, &format!("{}/sync", epath), &mut problems);
                }
                for (i, update) in edge.updates.iter().enumerate() {
                    unresolved(update, &edge_scope, &format!("{}/update {}", epath, i), &mut problems);
                }
                if let Some(weight) = &edge.weight {
                    unresolved(weight, &edge_scope, &format!("{}/weight", epath), &mut problems);
                }

                let mut dangling = false;
                for (label, end) in [("source", edge.source), ("target", edge.target)] {
                    if end.index() >= template.location_count() {
                        problems.push(Problem::error(&epath, format!("{} {} does not exist", label, end)));
                        dangling = true;
                    }
                }
                if dangling {
                    continue;
                }

                let chance = template.is_chance_edge(edge);
                if edge.weight.is_some() && !chance {
                    problems.push(Problem::error(&epath, "weight on an edge that does not leave a chance node"));
                }
                if edge.sync.is_some() && chance {
                    problems.push(Problem::error(&epath, "synchronization on a chance edge"));
                }
            }
        }

        for inst in &self.system.instantiations {
            if self.template_by_name(&inst.template).is_none() {
                problems.push(Problem::error(
                    format!("system/{}", inst.name),
                    format!("unknown template `{}`", inst.template),
                ));
            }
        }
        for name in self.system.names() {
            if self.system.instantiation(name).is_none() && self.template_by_name(name).is_none() {
                problems.push(Problem::error("system", format!("unknown process or template `{}`", name)));
            }
        }

        if let Some(priority) = &self.channel_priority {
            for channel in priority.channels() {
                if channel != ChannelPriority::DEFAULT && self.find_channel(channel).is_none() {
                    problems.push(Problem::error("channel priority", format!("unknown channel `{}`", channel)));
                }
            }
        }

        problems
    }
}

fn unresolved(expr: &Expr, scope: &BTreeSet<&str>, path: &str, problems: &mut Vec<Problem>) {
    for name in expr.identifiers() {
        if !scope.contains(name) {
            problems.push(Problem::error(path, format!("unknown identifier `{}`", name)));
        }
    }
}

fn cartesian(ranges: &[(i64, i64)]) -> Vec<Vec<i64>> {
    let mut result = vec![Vec::new()];
    for &(lo, hi) in ranges {
        let mut next = Vec::new();
        for prefix in &result {
            for v in lo..=hi {
                let mut values = prefix.clone();
                values.push(v);
                next.push(values);
            }
        }
        result = next;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::decl::TypedefDecl;
    use crate::decl::Declaration;
    use crate::expr::CompareOp;

    use test_log::test;

    fn idle_done() -> Network {
        let mut network = Network::default();
        network.add_global_variable(Type::int(), Variable::new("x").with_init(Expr::int(0)));
        let mut p = Template::new("P");
        let idle = p.add_location(Location::new("Idle"));
        let done = p.add_location(Location::new("Done"));
        p.set_initial(idle);
        p.add_edge(Edge::new(idle, idle).with_update(Expr::post_inc(Expr::ident("x"))));
        p.add_edge(Edge::new(idle, done).with_guard(Expr::compare(CompareOp::Gt, Expr::ident("x"), Expr::int(5))));
        network.add_template(p);
        network.instantiate("P");
        network
    }

    #[test]
    fn test_lookup_by_name() {
        let network = idle_done();
        let (t, l) = network.find_location("P", "Done").unwrap();
        assert_eq!(network.template(t).location(l).name, "Done");
        assert!(network.find_location("P", "Nowhere").is_none());
        assert!(network.find_variable("x").is_some());
        assert_eq!(network.edges().count(), 2);
        assert_eq!(network.location_count(), 2);
    }

    #[test]
    fn test_valid_network_has_no_problems() {
        assert_eq!(idle_done().validate(), Vec::new());
    }

    #[test]
    fn test_clone_is_independent() {
        let network = idle_done();
        let mut copy = network.clone();
        copy.template_mut(TemplateId::new(0))
            .edge_mut(EdgeId::new(1))
            .constrain(Expr::ff());
        copy.add_global_variable(Type::int(), Variable::new("__cur_transition"));
        assert!(network.find_variable("__cur_transition").is_none());
        assert_eq!(
            network.template(TemplateId::new(0)).edge(EdgeId::new(1)).guard.as_ref().unwrap().to_string(),
            "x > 5"
        );
    }

    #[test]
    fn test_validate_reports_problems() {
        let mut network = idle_done();
        let mut q = Template::new("Q");
        let a = q.add_location(Location::new("A"));
        let c = q.add_location(Location::chance("C"));
        q.add_edge(Edge::new(a, c).with_weight(Expr::int(2)));
        q.add_edge(Edge::new(c, a).with_sync(Sync::send("go")));
        q.add_edge(Edge::new(a, a).with_guard(Expr::ident("missing")));
        network.add_template(q);
        network.instantiate("R");
        network.channel_priority = Some(ChannelPriority {
            levels: vec![vec!["default".to_string()], vec!["nope".to_string()]],
        });

        let messages: Vec<String> = network.validate().iter().map(|p| p.to_string()).collect();
        assert!(messages.contains(&"template Q: error: no initial location".to_string()));
        assert!(messages.iter().any(|m| m.contains("edge 0") && m.contains("weight on an edge")));
        assert!(messages.iter().any(|m| m.contains("edge 1") && m.contains("synchronization on a chance edge")));
        assert!(messages.iter().any(|m| m.contains("unknown identifier `go`")));
        assert!(messages.contains(&"template Q/edge 2/guard: error: unknown identifier `missing`".to_string()));
        assert!(messages.contains(&"system: error: unknown process or template `R`".to_string()));
        assert!(messages.contains(&"channel priority: error: unknown channel `nope`".to_string()));
    }

    #[test]
    fn test_validate_reports_dangling_edge_from_json() {
        let mut value = serde_json::to_value(idle_done()).unwrap();
        value["templates"][0]["edges"][1]["target"] = serde_json::json!(5);
        value["templates"][0]["edges"][0]["source"] = serde_json::json!(7);
        let network: Network = serde_json::from_value(value).unwrap();

        let messages: Vec<String> = network.validate().iter().map(|p| p.to_string()).collect();
        assert_eq!(
            messages,
            vec![
                "template P/edge 0: error: source L7 does not exist".to_string(),
                "template P/edge 1: error: target L5 does not exist".to_string(),
            ]
        );
    }

    #[test]
    fn test_select_names_are_in_scope() {
        let mut network = idle_done();
        let t = network.template_mut(TemplateId::new(0));
        let idle = t.find_location("Idle").unwrap();
        t.add_edge(
            Edge::new(idle, idle)
                .with_select("i", Type::bounded_int(Expr::int(0), Expr::int(2)))
                .with_update(Expr::assign(Expr::ident("x"), Expr::ident("i"))),
        );
        assert_eq!(network.validate(), Vec::new());
    }

    #[test]
    fn test_processes_plain() {
        let processes = idle_done().processes().unwrap();
        assert_eq!(processes.len(), 1);
        assert_eq!(processes[0].name, "P");
        assert_eq!(processes[0].template, TemplateId::new(0));
    }

    #[test]
    fn test_processes_expand_bounded_parameters() {
        let mut network = Network::default();
        network.add_global_variable(Type::int().constant(), Variable::new("N").with_init(Expr::int(3)));
        network.declarations.push(Declaration::Typedef(TypedefDecl {
            ty: Type::bounded_int(
                Expr::int(0),
                Expr::binary(crate::expr::BinaryOp::Sub, Expr::ident("N"), Expr::int(1)),
            ),
            name: "id_t".to_string(),
        }));
        let mut t = Template::new("T");
        t.parameters.push(Parameter::new(Type::new(BaseType::Named("id_t".to_string())).constant(), "id"));
        let l = t.add_location(Location::new("L"));
        t.set_initial(l);
        network.add_template(t);
        network.instantiate("T");

        let names: Vec<String> = network.processes().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["T(0)", "T(1)", "T(2)"]);
    }

    #[test]
    fn test_processes_partial_instantiation() {
        let mut network = idle_done();
        network.system.instantiations.push(Instantiation {
            name: "Pair".to_string(),
            parameters: vec![
                Parameter::new(Type::bounded_int(Expr::int(0), Expr::int(1)), "a"),
                Parameter::new(Type::bounded_int(Expr::int(5), Expr::int(6)), "b"),
            ],
            template: "P".to_string(),
            arguments: Vec::new(),
        });
        network.instantiate("Pair");
        let names: Vec<String> = network.processes().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["P", "Pair(0,5)", "Pair(0,6)", "Pair(1,5)", "Pair(1,6)"]);
    }

    #[test]
    fn test_processes_reject_unbounded_parameter() {
        let mut network = idle_done();
        network.template_mut(TemplateId::new(0)).parameters.push(Parameter::new(Type::int(), "i"));
        let problems = network.processes().unwrap_err();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].message.contains("`i`"));
    }

    #[test]
    fn test_set_constant_reaches_templates() {
        let mut network = idle_done();
        network
            .template_mut(TemplateId::new(0))
            .declarations
            .add_variable(Type::int().constant(), Variable::new("K").with_init(Expr::int(1)));
        assert!(network.set_constant("K", "9"));
        assert!(!network.set_constant("x", "9"));
        let (_, k) = network.template(TemplateId::new(0)).declarations.find_variable("K").unwrap();
        assert_eq!(k.to_string(), "K = 9");
    }
}
