//! Instrumentation toolkit.
//!
//! Primitives that add observer automata, priority channels, counters and
//! coverage flags to a [`Network`]. Every primitive mutates the network it
//! is given; callers clone the base network first.
//!
//! | Primitive | Adds |
//! |-----------|------|
//! | [`add_priority_channel`] | urgent broadcast channel at the highest channel priority |
//! | [`add_observer`] | template `Wait -> Check(committed)` in the system line |
//! | [`add_post_sync_observer`] | observer entering `Check` when a channel fires |
//! | [`add_time_limit`] | cutoff template blocking time at a bound |
//! | [`add_missed_sync_counter`] | per-channel counter of receivers that missed a broadcast |
//! | [`add_state_counter`] | bounded meta counter on every counted edge |
//! | [`add_coverage`] | per-location flags and the `_Controller` template |

use log::debug;

use crate::decl::{ChannelPriority, Type, Variable};
use crate::expr::{CompareOp, Expr};
use crate::network::{Edge, Location, Network, Sync, SyncKind, Template};
use crate::oracle::State;
use crate::types::{LocationId, TemplateId};

pub const PRIORITY_CHANNEL: &str = "__priority_channel";
pub const POST_SYNC_OBSERVER: &str = "__check_sync_post_condition";
pub const TIME_LIMIT_TEMPLATE: &str = "__limit_time";
pub const TIME_LIMIT_CLOCK: &str = "__time";
pub const STATE_COUNTER: &str = "_counter";
pub const COVERAGE_FLAGS: &str = "_fl";
pub const COVERAGE_META_FLAGS: &str = "_f";
pub const COVERAGE_CHANNEL: &str = "__copy__";
pub const COVERAGE_CONTROLLER: &str = "_Controller";

/// Declares the urgent broadcast channel `name` and places it alone at the
/// highest channel priority, creating the priority order (with `default`
/// as its lowest level) if the network has none.
///
/// The oracle's statistical engine ignores channel priorities; an atomic
/// step built on this channel is only atomic under exact checking.
pub fn add_priority_channel(network: &mut Network, name: &str) {
    network.add_global_channel(name, true, true);
    network
        .channel_priority
        .get_or_insert_with(ChannelPriority::with_default)
        .push_highest(name);
    debug!("add_priority_channel({})", name);
}

/// Handles of an observer template.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Observer {
    pub template: TemplateId,
    pub wait: LocationId,
    pub check: LocationId,
}

/// Adds and instantiates a template `name` with an initial `Wait` location
/// and a committed `Check` location, without edges.
pub fn add_observer(network: &mut Network, name: &str) -> Observer {
    let mut template = Template::new(name);
    let wait = template.add_location(Location::new("Wait"));
    let check = template.add_location(Location::new("Check").committed());
    template.set_initial(wait);
    let id = network.add_template(template);
    network.instantiate(name);
    debug!("add_observer({})", name);
    Observer {
        template: id,
        wait,
        check,
    }
}

/// Adds an observer that moves to `Check` whenever `channel` fires and
/// returns to `Wait` right after. With `atomic`, the return edge sends on
/// the highest-priority channel so no other process moves while the
/// observer sits in `Check`. Returns the expression "observer is in Check".
pub fn add_post_sync_observer(network: &mut Network, channel: &str, atomic: bool) -> Expr {
    let observer = add_observer(network, POST_SYNC_OBSERVER);
    if atomic {
        add_priority_channel(network, PRIORITY_CHANNEL);
    }
    let template = network.template_mut(observer.template);
    template.add_edge(Edge::new(observer.wait, observer.check).with_sync(Sync::receive(channel)));
    let mut back = Edge::new(observer.check, observer.wait);
    if atomic {
        back = back.with_sync(Sync::send(PRIORITY_CHANNEL));
    }
    template.add_edge(back);
    Expr::member(Expr::ident(POST_SYNC_OBSERVER), "Check")
}

/// Adds the cutoff template: `__start` (initial, invariant `clk <= time`)
/// and urgent `__end`, joined by an edge guarded `clk >= time`. `clk` is a
/// fresh local clock unless `clock` names an existing one.
pub fn add_time_limit(network: &mut Network, time: &str, clock: Option<&str>) -> TemplateId {
    let mut template = Template::new(TIME_LIMIT_TEMPLATE);
    let clk = match clock {
        Some(name) => name.to_string(),
        None => {
            template
                .declarations
                .add_variable(Type::clock(), Variable::new(TIME_LIMIT_CLOCK));
            TIME_LIMIT_CLOCK.to_string()
        }
    };
    let bound = || Expr::literal(time.trim());
    let start = template.add_location(
        Location::new("__start").with_invariant(Expr::compare(CompareOp::Le, Expr::ident(&clk), bound())),
    );
    let end = template.add_location(Location::new("__end").urgent());
    template.set_initial(start);
    template.add_edge(Edge::new(start, end).with_guard(Expr::compare(CompareOp::Ge, Expr::ident(&clk), bound())));
    let id = network.add_template(template);
    network.instantiate(TIME_LIMIT_TEMPLATE);
    debug!("add_time_limit({}, {})", time, clk);
    id
}

/// Name of the counter used by [`add_missed_sync_counter`].
pub fn missed_counter(channel: &str) -> String {
    format!("__missed_{}", channel)
}

/// Counts receivers of `template` that have not yet taken a broadcast on
/// `channel`.
///
/// Edges sending on `channel` set the counter to `instances`; edges of
/// `template` synchronizing on `channel` decrement it (after the reset, if
/// they also send); every edge not on `channel` resets it to zero.
pub fn add_missed_sync_counter(network: &mut Network, channel: &str, template: &str, instances: usize) -> String {
    let counter = missed_counter(channel);
    network.add_global_variable(Type::int(), Variable::new(&counter).with_init(Expr::int(0)));
    for t in network.templates_mut() {
        let checked = t.name == template;
        for edge in t.edges_mut() {
            match &edge.sync {
                Some(sync) if sync.is_on(channel) => {
                    if sync.kind == SyncKind::Send {
                        edge.updates
                            .push(Expr::assign(Expr::ident(&counter), Expr::int(instances as i64)));
                    }
                    if checked {
                        edge.updates.push(Expr::post_dec(Expr::ident(&counter)));
                    }
                }
                _ => edge.updates.push(Expr::assign(Expr::ident(&counter), Expr::int(0))),
            }
        }
    }
    debug!("add_missed_sync_counter({}, {}, {})", channel, template, instances);
    counter
}

/// Declares `meta int[0, 10 * bound] _counter`, or nothing when `bound`
/// is zero.
pub fn add_state_counter(network: &mut Network, bound: u32) -> Option<String> {
    if bound == 0 {
        return None;
    }
    let ty = Type::bounded_int(Expr::int(0), Expr::int(10 * bound as i64)).meta();
    network.add_global_variable(ty, Variable::new(STATE_COUNTER).with_init(Expr::int(0)));
    Some(STATE_COUNTER.to_string())
}

/// Lets `edge` fire only while the counter is below `bound`, and counts the
/// firing. Receivers are left alone so a synchronization counts once.
pub fn count_edge(edge: &mut Edge, counter: &str, bound: u32) {
    if edge.is_receive() {
        return;
    }
    edge.constrain(Expr::compare(CompareOp::Lt, Expr::ident(counter), Expr::int(bound as i64)));
    edge.updates.push(Expr::post_inc(Expr::ident(counter)));
}

/// Coverage instrumentation of a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverage {
    /// Flag index to location, over every location of the templates that
    /// existed before instrumentation.
    pub slots: Vec<(TemplateId, LocationId)>,
    pub controller: TemplateId,
}

impl Coverage {
    /// Exploration query driving every flag to `true`.
    pub fn exploration_query(&self) -> String {
        if self.slots.len() == 1 {
            "E<>(true)".to_string()
        } else {
            format!(
                "E<> (forall (i : int[0, {}]) {}[i])",
                self.slots.len().saturating_sub(1),
                COVERAGE_META_FLAGS
            )
        }
    }

    /// Query whose witness ends with the flags copied into the live array.
    pub fn readout_query(&self) -> String {
        format!("E<> ({}.done)", COVERAGE_CONTROLLER)
    }

    /// Locations whose live flag is unset in `state`. Initial locations and
    /// chance nodes are never reported. `None` if `state` carries no flags.
    pub fn unreachable(&self, network: &Network, state: &State) -> Option<Vec<(TemplateId, LocationId)>> {
        let prefix = format!("{}[", COVERAGE_FLAGS);
        if !state.variables.keys().any(|k| k.starts_with(&prefix)) {
            return None;
        }
        let missing = self
            .slots
            .iter()
            .enumerate()
            .filter(|(i, _)| state.variables.get(&format!("{}[{}]", COVERAGE_FLAGS, i)).copied().unwrap_or(0) == 0)
            .map(|(_, &slot)| slot)
            .filter(|&(t, l)| {
                let template = network.template(t);
                template.initial != Some(l) && !template.is_chance(l)
            })
            .collect();
        Some(missing)
    }
}

/// Adds per-location reachability flags.
///
/// Every edge whose target is not a chance node sets the meta flag of its
/// target. A committed `_Controller` copies the meta flags into the live
/// array `_fl` over the highest-priority channel `__copy__`, so a trace
/// reaching `_Controller.done` reports them. With a non-zero
/// `state_space_bound` each counted edge is limited by [`count_edge`].
pub fn add_coverage(network: &mut Network, state_space_bound: u32) -> Coverage {
    let slots: Vec<(TemplateId, LocationId)> = network
        .templates()
        .flat_map(|(t, template)| template.locations().map(move |(l, _)| (t, l)))
        .collect();
    let size = Expr::int(slots.len() as i64);

    network.add_global_variable(Type::bool(), Variable::new(COVERAGE_FLAGS).with_dim(size.clone()));
    network.add_global_variable(Type::bool().meta(), Variable::new(COVERAGE_META_FLAGS).with_dim(size));
    add_priority_channel(network, COVERAGE_CHANNEL);
    let counter = add_state_counter(network, state_space_bound);

    let mut offset = 0;
    for template in network.templates_mut() {
        let chance: Vec<bool> = template.locations().map(|(_, l)| l.is_chance()).collect();
        for edge in template.edges_mut() {
            if chance[edge.target.index()] {
                continue;
            }
            let slot = Expr::indexed(COVERAGE_META_FLAGS, vec![Expr::int((offset + edge.target.index()) as i64)]);
            edge.updates.push(Expr::assign(slot, Expr::tt()));
            if let Some(counter) = &counter {
                count_edge(edge, counter, state_space_bound);
            }
        }
        offset += template.location_count();
    }

    let mut controller = Template::new(COVERAGE_CONTROLLER);
    let init = controller.add_location(Location::new("__init").committed());
    let done = controller.add_location(Location::new("done"));
    controller.set_initial(init);
    controller.add_edge(
        Edge::new(init, done)
            .with_sync(Sync::send(COVERAGE_CHANNEL))
            .with_update(Expr::assign(Expr::ident(COVERAGE_FLAGS), Expr::ident(COVERAGE_META_FLAGS))),
    );
    let controller = network.add_template(controller);
    network.system.processes.push(vec![COVERAGE_CONTROLLER.to_string()]);
    debug!("add_coverage: {} slots", slots.len());

    Coverage { slots, controller }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::types::EdgeId;

    use test_log::test;

    fn sender_receivers() -> Network {
        let mut network = Network::default();
        network.add_global_channel("b", false, true);
        network.add_global_variable(Type::bool(), Variable::new("flag").with_init(Expr::ff()));

        let mut s = Template::new("S");
        let a = s.add_location(Location::new("A"));
        let z = s.add_location(Location::new("Z"));
        s.set_initial(a);
        s.add_edge(Edge::new(a, z).with_sync(Sync::send("b")));
        s.add_edge(Edge::new(z, a));
        network.add_template(s);

        let mut t = Template::new("T");
        let a = t.add_location(Location::new("A"));
        t.set_initial(a);
        t.add_edge(Edge::new(a, a).with_sync(Sync::receive("b")));
        network.add_template(t);

        network.instantiate("S");
        network.instantiate("T");
        network
    }

    fn updates(network: &Network, t: usize, e: usize) -> Vec<String> {
        network
            .template(TemplateId::new(t))
            .edge(EdgeId::new(e))
            .updates
            .iter()
            .map(|u| u.to_string())
            .collect()
    }

    #[test]
    fn test_priority_channel_goes_on_top() {
        let mut network = Network::default();
        add_priority_channel(&mut network, "first");
        add_priority_channel(&mut network, "second");
        let priority = network.channel_priority.as_ref().unwrap();
        assert_eq!(priority.to_string(), "chan priority default < first < second;");
        assert_eq!(priority.highest(), Some(&["second".to_string()][..]));
        assert_eq!(network.declarations.to_string(), "urgent broadcast chan first;\nurgent broadcast chan second;\n");
    }

    #[test]
    fn test_post_sync_observer() {
        let mut network = sender_receivers();
        let check = add_post_sync_observer(&mut network, "b", true);
        assert_eq!(check.to_string(), "__check_sync_post_condition.Check");

        let (t, _) = network.find_location(POST_SYNC_OBSERVER, "Check").unwrap();
        let observer = network.template(t);
        assert_eq!(observer.edge(EdgeId::new(0)).sync.as_ref().unwrap().to_string(), "b?");
        assert_eq!(observer.edge(EdgeId::new(1)).sync.as_ref().unwrap().to_string(), "__priority_channel!");
        assert!(network.system.names().any(|n| n == POST_SYNC_OBSERVER));
        assert_eq!(network.validate(), Vec::new());
    }

    #[test]
    fn test_post_sync_observer_without_priority() {
        let mut network = sender_receivers();
        add_post_sync_observer(&mut network, "b", false);
        let (t, _) = network.find_location(POST_SYNC_OBSERVER, "Wait").unwrap();
        assert!(network.template(t).edge(EdgeId::new(1)).sync.is_none());
        assert!(network.channel_priority.is_none());
        assert!(network.find_channel(PRIORITY_CHANNEL).is_none());
    }

    #[test]
    fn test_time_limit() {
        let mut network = sender_receivers();
        let t = add_time_limit(&mut network, "100", None);
        let template = network.template(t);
        let start = template.location(template.initial.unwrap());
        assert_eq!(start.invariant.as_ref().unwrap().to_string(), "__time <= 100");
        assert_eq!(
            template.edge(EdgeId::new(0)).guard.as_ref().unwrap().to_string(),
            "__time >= 100"
        );
        assert!(template.declarations.find_variable(TIME_LIMIT_CLOCK).is_some());
        assert_eq!(network.validate(), Vec::new());
    }

    #[test]
    fn test_time_limit_on_existing_clock() {
        let mut network = sender_receivers();
        network.add_global_variable(Type::clock(), Variable::new("now"));
        let t = add_time_limit(&mut network, "5", Some("now"));
        assert!(network.template(t).declarations.is_empty());
        assert_eq!(network.validate(), Vec::new());
    }

    #[test]
    fn test_missed_sync_counter() {
        let mut network = sender_receivers();
        let counter = add_missed_sync_counter(&mut network, "b", "T", 3);
        assert_eq!(counter, "__missed_b");
        assert_eq!(updates(&network, 0, 0), vec!["__missed_b = 3"]);
        assert_eq!(updates(&network, 0, 1), vec!["__missed_b = 0"]);
        assert_eq!(updates(&network, 1, 0), vec!["__missed_b--"]);
        assert_eq!(network.validate(), Vec::new());
    }

    #[test]
    fn test_missed_sync_counter_sender_in_checked_template() {
        let mut network = sender_receivers();
        add_missed_sync_counter(&mut network, "b", "S", 1);
        assert_eq!(updates(&network, 0, 0), vec!["__missed_b = 1", "__missed_b--"]);
        assert!(updates(&network, 1, 0).is_empty());
    }

    #[test]
    fn test_count_edge_skips_receivers() {
        let mut send = Edge::new(LocationId::new(0), LocationId::new(1)).with_sync(Sync::send("b"));
        let mut recv = Edge::new(LocationId::new(0), LocationId::new(1)).with_sync(Sync::receive("b"));
        count_edge(&mut send, STATE_COUNTER, 4);
        count_edge(&mut recv, STATE_COUNTER, 4);
        assert_eq!(send.guard.unwrap().to_string(), "_counter < 4");
        assert!(recv.guard.is_none());
        assert!(recv.updates.is_empty());
    }

    #[test]
    fn test_coverage_flags() {
        let mut network = sender_receivers();
        let coverage = add_coverage(&mut network, 0);
        assert_eq!(coverage.slots.len(), 3);
        assert_eq!(coverage.exploration_query(), "E<> (forall (i : int[0, 2]) _f[i])");
        assert_eq!(coverage.readout_query(), "E<> (_Controller.done)");

        assert_eq!(updates(&network, 0, 0), vec!["_f[1] = true"]);
        assert_eq!(updates(&network, 0, 1), vec!["_f[0] = true"]);
        assert_eq!(updates(&network, 1, 0), vec!["_f[2] = true"]);
        assert_eq!(updates(&network, coverage.controller.index(), 0), vec!["_fl = _f"]);
        assert!(network.find_variable(STATE_COUNTER).is_none());
        assert_eq!(network.system.processes.last().unwrap(), &vec![COVERAGE_CONTROLLER.to_string()]);
        assert_eq!(network.validate(), Vec::new());
    }

    #[test]
    fn test_coverage_with_state_bound() {
        let mut network = sender_receivers();
        add_coverage(&mut network, 7);
        let (ty, _) = network.find_variable(STATE_COUNTER).unwrap();
        assert_eq!(ty.to_string(), "meta int[0,70]");
        let sender = network.template(TemplateId::new(0)).edge(EdgeId::new(0));
        assert_eq!(sender.guard.as_ref().unwrap().to_string(), "_counter < 7");
        assert!(network.template(TemplateId::new(1)).edge(EdgeId::new(0)).guard.is_none());
    }

    #[test]
    fn test_coverage_skips_chance_targets() {
        let mut network = Network::default();
        let mut q = Template::new("Q");
        let a = q.add_location(Location::new("A"));
        let c = q.add_location(Location::chance("C"));
        q.set_initial(a);
        q.add_edge(Edge::new(a, c));
        q.add_edge(Edge::new(c, a).with_weight(Expr::int(1)));
        network.add_template(q);
        network.instantiate("Q");
        add_coverage(&mut network, 0);
        assert!(updates(&network, 0, 0).is_empty());
        assert_eq!(updates(&network, 0, 1), vec!["_f[0] = true"]);
    }

    #[test]
    fn test_single_location_query() {
        let mut network = Network::default();
        let mut t = Template::new("T");
        let l = t.add_location(Location::new("L"));
        t.set_initial(l);
        network.add_template(t);
        network.instantiate("T");
        assert_eq!(add_coverage(&mut network, 0).exploration_query(), "E<>(true)");
    }

    #[test]
    fn test_coverage_readout() {
        let mut network = sender_receivers();
        let coverage = add_coverage(&mut network, 0);
        let state = State::default()
            .with_variable("_fl[0]", 0)
            .with_variable("_fl[1]", 0)
            .with_variable("_fl[2]", 1);
        let missing = coverage.unreachable(&network, &state).unwrap();
        assert_eq!(missing, vec![(TemplateId::new(0), LocationId::new(1))]);
        assert!(coverage.unreachable(&network, &State::default()).is_none());
    }
}
