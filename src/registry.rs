//! Ordered collection of completed runs plus at most one active run (§4.3).

use uuid::Uuid;

use crate::domain::Run;
use crate::error::CoordinatorError;

#[derive(Debug, Default)]
pub struct RunRegistry {
    /// Append-only except for `delete`; insertion order is chronological.
    history: Vec<Run>,
    active: Option<Run>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[Run] {
        &self.history
    }

    pub fn active(&self) -> Option<&Run> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut Run> {
        self.active.as_mut()
    }

    pub fn set_active(&mut self, run: Run) {
        self.active = Some(run);
    }

    /// Moves the active run to history, returning it. No-op (returns `None`)
    /// if there is no active run.
    pub fn retire_active(&mut self) -> Option<Run> {
        let run = self.active.take()?;
        self.history.push(run.clone());
        Some(run)
    }

    /// Scans `active` then `history`. An id string that doesn't parse as a
    /// UUID returns `None`, not an error.
    pub fn lookup(&self, id_string: &str) -> Option<&Run> {
        let id: Uuid = id_string.parse().ok()?;
        self.lookup_id(id)
    }

    pub fn lookup_id(&self, id: Uuid) -> Option<&Run> {
        if let Some(active) = &self.active {
            if active.id == id {
                return Some(active);
            }
        }
        self.history.iter().find(|r| r.id == id)
    }

    pub fn lookup_id_mut(&mut self, id: Uuid) -> Option<&mut Run> {
        if let Some(active) = &mut self.active {
            if active.id == id {
                return Some(active);
            }
        }
        self.history.iter_mut().find(|r| r.id == id)
    }

    /// Refuses with `CannotDeleteActive` if `id` names the active run;
    /// otherwise removes it from history. `NotFound` if it isn't there.
    pub fn delete(&mut self, id: Uuid) -> Result<(), CoordinatorError> {
        if let Some(active) = &self.active {
            if active.id == id {
                return Err(CoordinatorError::CannotDeleteActive);
            }
        }
        let before = self.history.len();
        self.history.retain(|r| r.id != id);
        if self.history.len() == before {
            return Err(CoordinatorError::NotFound(id));
        }
        Ok(())
    }

    pub fn rename(&mut self, id: Uuid, name: String) -> Result<(), CoordinatorError> {
        let run = self.lookup_id_mut(id).ok_or(CoordinatorError::NotFound(id))?;
        run.name = name;
        Ok(())
    }

    /// Inserts an imported/preloaded run into history (never becomes active).
    pub fn insert_imported(&mut self, run: Run) {
        self.history.push(run);
    }

    /// Counts runs (history ∪ active) whose `program_name` matches, plus
    /// one, to produce the default `"Run #n of <program_name>"`.
    pub fn next_run_name(&self, program_name: &str) -> String {
        let mut count = self
            .history
            .iter()
            .filter(|r| r.program_name == program_name)
            .count();
        if let Some(active) = &self.active {
            if active.program_name == program_name {
                count += 1;
            }
        }
        format!("Run #{} of {program_name}", count + 1)
    }

    /// All runs (history then active, if any) — used for the UI's
    /// `init_app_state` snapshot.
    pub fn all_runs(&self) -> Vec<&Run> {
        let mut all: Vec<&Run> = self.history.iter().collect();
        if let Some(active) = &self.active {
            all.push(active);
        }
        all
    }
}
