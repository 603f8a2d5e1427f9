// ABOUTME: Locale selection and the localized status phrases shown while the agent works
// ABOUTME: Every phrase is matched exhaustively per locale so a missing translation fails to compile

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// UI language for status text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    He,
    #[default]
    En,
}

impl Locale {
    pub fn code(self) -> &'static str {
        match self {
            Locale::He => "he",
            Locale::En => "en",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "he" => Ok(Locale::He),
            "en" => Ok(Locale::En),
            other => Err(format!("unsupported locale '{other}' (expected 'he' or 'en')")),
        }
    }
}

/// Status phrases produced by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phrase<'a> {
    SettingUp,
    CheckingBuild,
    StartingPreview,
    SavingProject,
    InitializingProject,
    SavingCheckpoint,
    Publishing,
    AddingComponents,
    AddingUiComponents,
    SettingUpFolders,
    Building,
    MakingChanges,
    Retry,
    Creating(&'a str),
    Editing(&'a str),
}

impl Phrase<'_> {
    pub fn text(&self, locale: Locale) -> String {
        use Locale::{En, He};
        match (self, locale) {
            (Phrase::SettingUp, En) => "Setting up your project...".into(),
            (Phrase::SettingUp, He) => "מקים את הפרויקט שלך...".into(),
            (Phrase::CheckingBuild, En) => "Checking everything works...".into(),
            (Phrase::CheckingBuild, He) => "בודק שהכל עובד...".into(),
            (Phrase::StartingPreview, En) => "Starting your preview...".into(),
            (Phrase::StartingPreview, He) => "מפעיל את התצוגה המקדימה...".into(),
            (Phrase::SavingProject, En) => "Saving your project...".into(),
            (Phrase::SavingProject, He) => "שומר את הפרויקט שלך...".into(),
            (Phrase::InitializingProject, En) => "Initializing project...".into(),
            (Phrase::InitializingProject, He) => "מאתחל את הפרויקט...".into(),
            (Phrase::SavingCheckpoint, En) => "Saving a checkpoint...".into(),
            (Phrase::SavingCheckpoint, He) => "שומר נקודת ביקורת...".into(),
            (Phrase::Publishing, En) => "Publishing to the internet...".into(),
            (Phrase::Publishing, He) => "מפרסם לאינטרנט...".into(),
            (Phrase::AddingComponents, En) => "Adding components...".into(),
            (Phrase::AddingComponents, He) => "מוסיף רכיבים...".into(),
            (Phrase::AddingUiComponents, En) => "Adding UI components...".into(),
            (Phrase::AddingUiComponents, He) => "מוסיף רכיבי ממשק...".into(),
            (Phrase::SettingUpFolders, En) => "Setting up folders...".into(),
            (Phrase::SettingUpFolders, He) => "מכין תיקיות...".into(),
            (Phrase::Building, En) => "Building...".into(),
            (Phrase::Building, He) => "בונה...".into(),
            (Phrase::MakingChanges, En) => "Making changes...".into(),
            (Phrase::MakingChanges, He) => "מבצע שינויים...".into(),
            (Phrase::Retry, En) => "Whoops. Give me a sec...".into(),
            (Phrase::Retry, He) => "אופס. תן לי שנייה...".into(),
            (Phrase::Creating(file), En) => format!("Creating `{file}`..."),
            (Phrase::Creating(file), He) => format!("יוצר `{file}`..."),
            (Phrase::Editing(file), En) => format!("Editing `{file}`..."),
            (Phrase::Editing(file), He) => format!("עורך `{file}`..."),
        }
    }
}
