// validation.rs — Pluggable checks run before a draft is staged.
//
// Domain rules (hour caps, exclusive codes, ...) belong to the caller. A
// session only knows that a validator looks at a slot's base and draft and
// either accepts it or returns a violation message.

use ds_changeset::Record;
use ds_workspace::SlotKey;

/// A check a draft must pass before `stage_checked` stages it.
pub trait DraftValidator: Send + Sync {
    /// `Err(message)` refuses the draft. `draft` is `None` for a slot
    /// deletion.
    fn validate(&self, slot: &SlotKey, base: &[Record], draft: Option<&[Record]>)
        -> Result<(), String>;
}

impl<F> DraftValidator for F
where
    F: Fn(&SlotKey, &[Record], Option<&[Record]>) -> Result<(), String> + Send + Sync,
{
    fn validate(
        &self,
        slot: &SlotKey,
        base: &[Record],
        draft: Option<&[Record]>,
    ) -> Result<(), String> {
        self(slot, base, draft)
    }
}

/// Ordered collection of validators.
#[derive(Default)]
pub struct ValidatorSet {
    validators: Vec<Box<dyn DraftValidator>>,
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, validator: Box<dyn DraftValidator>) {
        self.validators.push(validator);
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Run every validator and collect all violations (empty = accepted).
    pub fn check(&self, slot: &SlotKey, base: &[Record], draft: Option<&[Record]>) -> Vec<String> {
        self.validators
            .iter()
            .filter_map(|v| v.validate(slot, base, draft).err())
            .collect()
    }
}
