// selectors.rs — Read-only views over a staging state.
//
// Nothing here mutates the state or holds on to it. Every function returns
// owned data, so callers never see a live entry. During an in-flight commit
// these views reflect the optimistically cleared store.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use ds_changeset::semantic::equal;
use ds_changeset::{compute_diff, summarize, MatchStrategy, Record, SlotDiff};
use ds_workspace::{BaseProvider, DateKey, EntityId, SlotKey, StagedOp, StagingState, StatusTag};

/// `entity -> day -> tag` for every slot with a pending change.
pub type StatusMap = BTreeMap<EntityId, BTreeMap<DateKey, StatusTag>>;

/// The authoritative records of a slot, straight from the provider.
pub fn base_view<P>(provider: &P, entity_id: &str, date_key: &str) -> Vec<Record>
where
    P: BaseProvider + ?Sized,
{
    provider.base_records(entity_id, date_key)
}

/// What the slot would contain if everything staged were committed.
pub fn merged_view<P>(
    state: &StagingState,
    provider: &P,
    entity_id: &str,
    date_key: &str,
) -> Vec<Record>
where
    P: BaseProvider + ?Sized,
{
    match state.get(entity_id, date_key) {
        None => provider.base_records(entity_id, date_key),
        Some(entry) => entry.draft.clone().unwrap_or_default(),
    }
}

/// Overlay tag for one slot; `None` when nothing is pending.
pub fn status_tag(state: &StagingState, entity_id: &str, date_key: &str) -> Option<StatusTag> {
    state.get(entity_id, date_key)?.op.status_tag()
}

/// Tags for every staged slot, noop entries skipped.
pub fn build_status_map(state: &StagingState) -> StatusMap {
    let mut map = StatusMap::new();
    for entry in state.iter() {
        if let Some(tag) = entry.op.status_tag() {
            map.entry(entry.entity_id.clone())
                .or_default()
                .insert(entry.date_key.clone(), tag);
        }
    }
    map
}

/// Number of staged slots. Noop entries only count when `include_noop`.
pub fn count(state: &StagingState, include_noop: bool) -> usize {
    if include_noop {
        return state.len();
    }
    state.iter().filter(|e| e.op != StagedOp::Noop).count()
}

/// Tag a slot by comparing its draft with its frozen base, ignoring `op`.
///
/// A reset or noop slot whose draft matches the base gets no tag.
pub fn content_tag(base: &[Record], draft: Option<&[Record]>) -> Option<StatusTag> {
    let Some(draft) = draft else {
        return Some(StatusTag::StagedDelete);
    };
    match (base.is_empty(), draft.is_empty()) {
        (true, false) => Some(StatusTag::StagedInsert),
        (false, true) => Some(StatusTag::StagedDelete),
        _ if equal(Some(base), Some(draft)) => None,
        _ => Some(StatusTag::StagedUpdate),
    }
}

/// Flat `day -> tag` map restricted to `visible_dates`.
///
/// Tags come from [`content_tag`], so a slot that changed nothing on screen
/// stays untagged here even when `build_status_map` lists it. With an
/// entity, that entity's tags. Without one, tags of all entities are folded
/// per day, the strongest winning (delete > insert > update).
pub fn visible_status_map<'a, I>(
    state: &StagingState,
    visible_dates: I,
    entity_id: Option<&str>,
) -> BTreeMap<DateKey, StatusTag>
where
    I: IntoIterator<Item = &'a str>,
{
    let visible: BTreeSet<&str> = visible_dates.into_iter().collect();
    let mut out: BTreeMap<DateKey, StatusTag> = BTreeMap::new();
    let entries = state
        .iter()
        .filter(|e| entity_id.map_or(true, |wanted| e.entity_id == wanted))
        .filter(|e| visible.contains(e.date_key.as_str()));
    for entry in entries {
        let Some(tag) = content_tag(entry.base_records(), entry.draft.as_deref()) else {
            continue;
        };
        out.entry(entry.date_key.clone())
            .and_modify(|current| {
                if tag.precedence() > current.precedence() {
                    *current = tag;
                }
            })
            .or_insert(tag);
    }
    out
}

/// An entity's whole day map with staged drafts laid over `base_days`.
///
/// Days staged for deletion come out as empty sequences.
pub fn merged_entity_view(
    state: &StagingState,
    entity_id: &str,
    base_days: &BTreeMap<DateKey, Vec<Record>>,
) -> BTreeMap<DateKey, Vec<Record>> {
    let mut merged = base_days.clone();
    if let Some(days) = state.entries().get(entity_id) {
        for (date_key, entry) in days {
            merged.insert(date_key.clone(), entry.draft.clone().unwrap_or_default());
        }
    }
    merged
}

/// One pending slot as shown in a change panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedItem {
    pub slot: SlotKey,
    pub op: StagedOp,
    pub diff: SlotDiff,
    pub summary: String,
}

/// Every non-noop slot in staging order, with its diff against the base.
pub fn staged_items(state: &StagingState, strategy: MatchStrategy) -> Vec<StagedItem> {
    state
        .iter()
        .filter(|e| e.op != StagedOp::Noop)
        .map(|entry| {
            let diff = compute_diff(entry.base_records(), entry.draft.as_deref(), strategy);
            StagedItem {
                slot: entry.slot(),
                op: entry.op,
                summary: summarize(&diff),
                diff,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ds_changeset::DiffKind;
    use ds_workspace::{MapBaseProvider, StagingAction};

    fn rec(code: &str, amount: f64) -> Record {
        Record::new(code, amount)
    }

    fn stage(state: &mut StagingState, entity: &str, date: &str, base: Vec<Record>, draft: Option<Vec<Record>>) {
        state.apply(StagingAction::Upsert {
            slot: SlotKey::new(entity, date),
            base: Some(base),
            draft,
        });
    }

    #[test]
    fn merged_view_prefers_the_draft() {
        let provider = MapBaseProvider::new()
            .with_day("e1", "d1", vec![rec("A", 1.0)])
            .with_day("e1", "d2", vec![rec("B", 2.0)]);
        let mut state = StagingState::new();
        stage(&mut state, "e1", "d1", vec![rec("A", 1.0)], Some(vec![rec("A", 3.0)]));
        stage(&mut state, "e1", "d2", vec![rec("B", 2.0)], None);

        assert_eq!(merged_view(&state, &provider, "e1", "d1"), vec![rec("A", 3.0)]);
        assert!(merged_view(&state, &provider, "e1", "d2").is_empty());
        assert!(merged_view(&state, &provider, "e1", "d3").is_empty());
        assert_eq!(base_view(&provider, "e1", "d2"), vec![rec("B", 2.0)]);
    }

    #[test]
    fn tags_follow_the_op_and_skip_noop() {
        let mut state = StagingState::new();
        stage(&mut state, "e1", "d1", vec![], Some(vec![rec("A", 1.0)]));
        stage(&mut state, "e1", "d2", vec![rec("A", 1.0)], Some(vec![rec("A", 2.0)]));
        stage(&mut state, "e1", "d2", vec![], Some(vec![rec("A", 1.0)]));
        stage(&mut state, "e2", "d1", vec![rec("A", 1.0)], None);

        assert_eq!(status_tag(&state, "e1", "d1"), Some(StatusTag::StagedInsert));
        assert_eq!(status_tag(&state, "e1", "d2"), None);
        assert_eq!(status_tag(&state, "e2", "d1"), Some(StatusTag::StagedDelete));
        assert_eq!(status_tag(&state, "e3", "d1"), None);

        let map = build_status_map(&state);
        assert_eq!(map["e1"].len(), 1);
        assert_eq!(map["e2"]["d1"], StatusTag::StagedDelete);

        assert_eq!(count(&state, false), 2);
        assert_eq!(count(&state, true), 3);
    }

    #[test]
    fn reset_entries_still_show_as_updates() {
        let mut state = StagingState::new();
        stage(&mut state, "e1", "d1", vec![rec("A", 1.0)], Some(vec![rec("A", 2.0)]));
        state.apply(StagingAction::Reset {
            slot: SlotKey::new("e1", "d1"),
        });
        assert_eq!(status_tag(&state, "e1", "d1"), Some(StatusTag::StagedUpdate));
        assert_eq!(count(&state, false), 1);
        // Nothing differs on screen, so the visible overlay leaves it bare.
        assert!(visible_status_map(&state, ["d1"], Some("e1")).is_empty());
        assert!(visible_status_map(&state, ["d1"], None).is_empty());
    }

    #[test]
    fn content_tags_compare_draft_with_base() {
        let day = vec![rec("A", 1.0)];
        assert_eq!(content_tag(&day, None), Some(StatusTag::StagedDelete));
        assert_eq!(content_tag(&[], None), Some(StatusTag::StagedDelete));
        assert_eq!(content_tag(&[], Some(day.as_slice())), Some(StatusTag::StagedInsert));
        assert_eq!(content_tag(&day, Some(&[][..])), Some(StatusTag::StagedDelete));
        assert_eq!(content_tag(&day, Some(day.as_slice())), None);
        assert_eq!(content_tag(&[], Some(&[][..])), None);
        assert_eq!(
            content_tag(&day, Some(&[rec("A", 2.0)][..])),
            Some(StatusTag::StagedUpdate)
        );
    }

    #[test]
    fn visible_map_folds_entities_by_precedence() {
        let mut state = StagingState::new();
        stage(&mut state, "e1", "d1", vec![rec("A", 1.0)], Some(vec![rec("A", 2.0)]));
        stage(&mut state, "e2", "d1", vec![], Some(vec![rec("B", 1.0)]));
        stage(&mut state, "e3", "d1", vec![rec("C", 1.0)], None);
        stage(&mut state, "e1", "d2", vec![rec("A", 1.0)], Some(vec![rec("A", 2.0)]));
        stage(&mut state, "e2", "d2", vec![], Some(vec![rec("B", 1.0)]));
        stage(&mut state, "e1", "d9", vec![], Some(vec![rec("Z", 1.0)]));

        let all = visible_status_map(&state, ["d1", "d2", "d3"], None);
        assert_eq!(all.len(), 2);
        assert_eq!(all["d1"], StatusTag::StagedDelete);
        assert_eq!(all["d2"], StatusTag::StagedInsert);

        let one = visible_status_map(&state, ["d1", "d2", "d9"], Some("e1"));
        assert_eq!(one["d1"], StatusTag::StagedUpdate);
        assert_eq!(one["d9"], StatusTag::StagedInsert);
    }

    #[test]
    fn entity_view_overlays_drafts_on_base_days() {
        let mut base_days = BTreeMap::new();
        base_days.insert("d1".to_string(), vec![rec("A", 1.0)]);
        base_days.insert("d2".to_string(), vec![rec("B", 2.0)]);

        let mut state = StagingState::new();
        stage(&mut state, "e1", "d2", vec![rec("B", 2.0)], None);
        stage(&mut state, "e1", "d3", vec![], Some(vec![rec("C", 3.0)]));
        stage(&mut state, "e2", "d1", vec![], Some(vec![rec("X", 9.0)]));

        let merged = merged_entity_view(&state, "e1", &base_days);
        assert_eq!(merged["d1"], vec![rec("A", 1.0)]);
        assert!(merged["d2"].is_empty());
        assert_eq!(merged["d3"], vec![rec("C", 3.0)]);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn staged_items_carry_diff_and_summary() {
        let mut state = StagingState::new();
        stage(&mut state, "e1", "d1", vec![], Some(vec![rec("A", 1.0), rec("B", 1.0)]));
        stage(&mut state, "e1", "d2", vec![rec("A", 1.0)], None);
        stage(&mut state, "e1", "d3", vec![rec("A", 1.0)], Some(vec![rec("A", 2.0)]));
        stage(&mut state, "e1", "d3", vec![], Some(vec![rec("A", 1.0)]));

        let items = staged_items(&state, MatchStrategy::default());
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].slot, SlotKey::new("e1", "d1"));
        assert_eq!(items[0].diff.kind, DiffKind::NewSlot);
        assert_eq!(items[0].summary, "2 new records");
        assert_eq!(items[1].op, StagedOp::Delete);
        assert_eq!(items[1].summary, "slot deleted");
    }
}
