//! Tree synchronization engine.
//!
//! Turns the difference between a control's previous-children snapshot
//! and its current children into an ordered command script: `set` for
//! attribute deltas, `remove` for vanished runs, `add` (carrying the
//! serialized subtree inline) for new runs, and recursion into
//! unchanged children. The edit script comes from an ordered
//! longest-common-subsequence alignment over stable per-node surrogate
//! keys, so two distinct control instances never alias.

use std::collections::HashMap;
use std::sync::Arc;

use similar::{capture_diff_slices, Algorithm, DiffOp};

use easel_protocol::Command;

use crate::control::Control;

/// Indent difference between a control and its children in a command
/// script.
pub(crate) const INDENT_STEP: usize = 2;

/// Page-wide id -> control lookup table.
pub(crate) type Index = HashMap<String, Arc<dyn Control>>;

/// Everything one synchronization produces: the wire commands, the new
/// controls awaiting host-assigned ids (in serialization order), and
/// the previous-children snapshots to commit once the host confirms the
/// batch. A failed round trip drops the plan, leaving the diff baseline
/// one state behind the host.
#[derive(Default)]
pub(crate) struct SyncPlan {
    pub commands: Vec<Command>,
    pub added: Vec<Arc<dyn Control>>,
    snapshots: Vec<(Arc<dyn Control>, Vec<Arc<dyn Control>>)>,
}

impl SyncPlan {
    pub fn new() -> Self {
        Self::default()
    }

    fn stage_snapshot(&mut self, control: Arc<dyn Control>, children: Vec<Arc<dyn Control>>) {
        self.snapshots.push((control, children));
    }

    /// Advance every staged diff baseline. Called only after a
    /// successful round trip.
    pub fn commit_snapshots(&mut self) {
        for (control, children) in self.snapshots.drain(..) {
            control.state().replace_previous_children(children);
        }
    }
}

/// Build the incremental command script for `control` against its
/// previous snapshot, recursing into unchanged children.
pub(crate) fn update_commands(control: &Arc<dyn Control>, index: &mut Index, plan: &mut SyncPlan) {
    let uid = control.state().uid();

    // Attribute delta for this node: only dirty slots, tagged with the
    // assigned id. A node the host has never seen is skipped; its full
    // state travels inside the enclosing `add`.
    if let Some(uid) = &uid {
        let attrs = control.state().fold_command_attrs(true);
        if !attrs.is_empty() {
            plan.commands.push(Command {
                name: Some("set".into()),
                values: vec![uid.clone()],
                attrs,
                ..Command::default()
            });
        }
    }

    let previous = control.state().previous_children();
    let current = control.children();

    let previous_keys: Vec<u64> = previous.iter().map(|c| c.state().key().raw()).collect();
    let current_keys: Vec<u64> = current.iter().map(|c| c.state().key().raw()).collect();

    // Position of the next kept-or-inserted child on the host side;
    // advanced for equal and inserted runs only, so every `add` carries
    // the offset at which the host must splice it.
    let mut n = 0usize;

    for op in capture_diff_slices(Algorithm::Myers, &previous_keys, &current_keys) {
        match op {
            DiffOp::Equal { old_index, len, .. } => {
                for child in &previous[old_index..old_index + len] {
                    update_commands(child, index, plan);
                    n += 1;
                }
            }
            DiffOp::Delete { old_index, old_len, .. } => {
                push_remove(&previous[old_index..old_index + old_len], index, plan);
            }
            DiffOp::Insert { new_index, new_len, .. } => {
                for child in &current[new_index..new_index + new_len] {
                    push_add(child, uid.as_deref(), n, index, plan);
                    n += 1;
                }
            }
            DiffOp::Replace { old_index, old_len, new_index, new_len } => {
                push_remove(&previous[old_index..old_index + old_len], index, plan);
                for child in &current[new_index..new_index + new_len] {
                    push_add(child, uid.as_deref(), n, index, plan);
                    n += 1;
                }
            }
        }
    }

    plan.stage_snapshot(control.clone(), current);
}

/// Serialize a full subtree into define commands, one per node,
/// children one indent step deeper. New nodes are appended to the
/// plan's accumulator in traversal order; the host mints their ids in
/// exactly this order.
pub(crate) fn subtree_commands(
    control: &Arc<dyn Control>,
    indent: usize,
    index: &mut Index,
    plan: &mut SyncPlan,
) -> Vec<Command> {
    // Reclaim a stale id if this node is being re-added after removal.
    if let Some(uid) = control.state().uid() {
        index.remove(&uid);
    }

    let mut attrs = control.state().fold_command_attrs(false);
    if let Some(id) = control.state().get_str("id") {
        attrs.insert("id".into(), id);
    }

    let mut commands = vec![Command {
        indent,
        values: vec![control.control_name().to_string()],
        attrs,
        ..Command::default()
    }];

    plan.added.push(control.clone());

    let children = control.children();
    for child in &children {
        commands.extend(subtree_commands(child, indent + INDENT_STEP, index, plan));
    }
    plan.stage_snapshot(control.clone(), children);

    commands
}

/// Detach a control and all of its descendants from the index.
pub(crate) fn remove_from_index(index: &mut Index, control: &Arc<dyn Control>) {
    for child in control.children() {
        remove_from_index(index, &child);
    }
    if let Some(uid) = control.state().uid() {
        index.remove(&uid);
    }
}

fn push_remove(run: &[Arc<dyn Control>], index: &mut Index, plan: &mut SyncPlan) {
    let mut ids = Vec::with_capacity(run.len());
    for control in run {
        remove_from_index(index, control);
        if let Some(uid) = control.state().uid() {
            ids.push(uid);
        }
    }
    if !ids.is_empty() {
        plan.commands.push(Command::op("remove", ids));
    }
}

fn push_add(
    control: &Arc<dyn Control>,
    parent_uid: Option<&str>,
    at: usize,
    index: &mut Index,
    plan: &mut SyncPlan,
) {
    let inner = subtree_commands(control, 0, index, plan);
    let mut command = Command::op("add", vec![]);
    command
        .attrs
        .insert("to".into(), parent_uid.unwrap_or_default().to_string());
    command.attrs.insert("at".into(), at.to_string());
    command.commands = inner;
    plan.commands.push(command);
}
