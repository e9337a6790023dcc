//! View: a pure function from controller state to what is on screen.
//!
//! DESIGN
//! ======
//! `render` decides structure only (which surface, which rows, which
//! placeholder); `Display` lays that structure out as terminal text. Exactly
//! one of the two surfaces exists for any input, chosen solely by whether an
//! identity is present.

use std::fmt;

use crate::net::types::{Identity, SavedNameRecord};
use crate::state::PetDescription;

pub const APP_TITLE: &str = "Name My Pet";
pub const NO_CANDIDATES: &str = "No names generated yet.";
pub const NO_SAVED_NAMES: &str = "You haven't saved any names yet.";
pub const GENERATE_LABEL: &str = "Generate Names";
pub const GENERATING_LABEL: &str = "Generating...";

/// Snapshot of everything the view depends on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewModel {
    pub identity: Option<Identity>,
    pub pet: PetDescription,
    pub candidates: Vec<String>,
    pub loading: bool,
    pub saved: Vec<SavedNameRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    SignIn,
    Home(HomeView),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeView {
    pub user_label: String,
    pub pet_type: String,
    pub characteristics: String,
    pub generate_label: &'static str,
    pub generate_enabled: bool,
    pub candidates: Section<CandidateRow>,
    pub saved: Section<String>,
}

/// A list that renders a fixed placeholder when empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section<T> {
    Empty(&'static str),
    Rows(Vec<T>),
}

impl<T> Section<T> {
    fn from_rows(rows: Vec<T>, placeholder: &'static str) -> Self {
        if rows.is_empty() { Self::Empty(placeholder) } else { Self::Rows(rows) }
    }
}

/// A candidate paired with its save action (1-based index).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRow {
    pub save_index: usize,
    pub name: String,
}

#[must_use]
pub fn render(model: &ViewModel) -> View {
    let Some(identity) = &model.identity else {
        return View::SignIn;
    };

    let candidates = model
        .candidates
        .iter()
        .enumerate()
        .map(|(i, name)| CandidateRow { save_index: i + 1, name: name.clone() })
        .collect();
    let saved = model.saved.iter().map(|r| r.name.clone()).collect();

    View::Home(HomeView {
        user_label: identity.label(),
        pet_type: model.pet.pet_type.clone(),
        characteristics: model.pet.characteristics.clone(),
        generate_label: if model.loading { GENERATING_LABEL } else { GENERATE_LABEL },
        generate_enabled: !model.loading,
        candidates: Section::from_rows(candidates, NO_CANDIDATES),
        saved: Section::from_rows(saved, NO_SAVED_NAMES),
    })
}

// =============================================================================
// TERMINAL LAYOUT
// =============================================================================

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignIn => {
                writeln!(f, "== Sign in to {APP_TITLE} ==")?;
                writeln!(f, "  login <email>   send a magic link / one-time code")?;
                writeln!(f, "  code <code>     finish signing in with the mailed code")
            }
            Self::Home(home) => write!(f, "{home}"),
        }
    }
}

impl fmt::Display for HomeView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {APP_TITLE} == ({})  [logout]", self.user_label)?;
        writeln!(f)?;
        writeln!(f, "Tell us about your pet")?;
        writeln!(f, "  type:   {}", or_hint(&self.pet_type, "e.g. dog, cat, bird"))?;
        writeln!(f, "  traits: {}", or_hint(&self.characteristics, "e.g. playful, brown, small"))?;
        if self.generate_enabled {
            writeln!(f, "  [generate] {}", self.generate_label)?;
        } else {
            writeln!(f, "  {}", self.generate_label)?;
        }
        writeln!(f)?;
        writeln!(f, "Generated Names")?;
        match &self.candidates {
            Section::Empty(placeholder) => writeln!(f, "  {placeholder}")?,
            Section::Rows(rows) => {
                for row in rows {
                    writeln!(f, "  {}. {}  [save {}]", row.save_index, row.name, row.save_index)?;
                }
            }
        }
        writeln!(f)?;
        writeln!(f, "Your Saved Names")?;
        match &self.saved {
            Section::Empty(placeholder) => writeln!(f, "  {placeholder}"),
            Section::Rows(names) => names.iter().try_for_each(|name| writeln!(f, "  - {name}")),
        }
    }
}

fn or_hint<'a>(value: &'a str, hint: &'a str) -> &'a str {
    if value.is_empty() { hint } else { value }
}

#[cfg(test)]
#[path = "view_test.rs"]
mod tests;
