//! Static application-type classification
//!
//! Scans the affected file set for framework markers. Never guesses
//! silently: either a marker is found or the classifier reports
//! `Unknown` and callers must surface that as an explicit note, not treat
//! it as any other type.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppType {
    ScriptOrCli,
    Web,
    Service,
    GuiOrGame,
    Unknown,
}

impl AppType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppType::ScriptOrCli => "script_or_cli",
            AppType::Web => "web",
            AppType::Service => "service",
            AppType::GuiOrGame => "gui_or_game",
            AppType::Unknown => "unknown",
        }
    }
}

/// One marker: a substring to search for in file content, and the import
/// or decorator pattern that, if present, classifies the project.
struct Marker {
    needle: &'static str,
    app_type: AppType,
}

/// Ordered by specificity: web frameworks checked before generic service
/// markers, GUI/game before falling through to script/CLI.
const MARKERS: &[Marker] = &[
    Marker { needle: "from flask import", app_type: AppType::Web },
    Marker { needle: "import flask", app_type: AppType::Web },
    Marker { needle: "from fastapi import", app_type: AppType::Web },
    Marker { needle: "import fastapi", app_type: AppType::Web },
    Marker { needle: "from django", app_type: AppType::Web },
    Marker { needle: "import django", app_type: AppType::Web },
    Marker { needle: "from aiohttp import", app_type: AppType::Web },
    Marker { needle: "import tkinter", app_type: AppType::GuiOrGame },
    Marker { needle: "from PyQt", app_type: AppType::GuiOrGame },
    Marker { needle: "import pygame", app_type: AppType::GuiOrGame },
    Marker { needle: "import kivy", app_type: AppType::GuiOrGame },
    Marker { needle: "asyncio.start_server", app_type: AppType::Service },
    Marker { needle: "grpc.server", app_type: AppType::Service },
    Marker { needle: "socketserver.", app_type: AppType::Service },
    Marker { needle: "if __name__ == \"__main__\"", app_type: AppType::ScriptOrCli },
    Marker { needle: "if __name__ == '__main__'", app_type: AppType::ScriptOrCli },
    Marker { needle: "import argparse", app_type: AppType::ScriptOrCli },
    Marker { needle: "import click", app_type: AppType::ScriptOrCli },
];

/// Classify a project from the text content of its affected files
/// (changed + dependents, or a wider project scan — caller's choice).
/// Returns the first marker category found across all files, preferring
/// the order `MARKERS` declares them in (most specific first); if no
/// marker is found anywhere, reports `Unknown` rather than guessing.
pub fn classify(file_contents: &[(String, String)]) -> (AppType, Option<String>) {
    let mut found: BTreeSet<usize> = BTreeSet::new();
    for (_, content) in file_contents {
        for (i, marker) in MARKERS.iter().enumerate() {
            if content.contains(marker.needle) {
                found.insert(i);
            }
        }
    }

    match found.into_iter().next() {
        Some(i) => (MARKERS[i].app_type, None),
        None => (
            AppType::Unknown,
            Some("no framework marker found; classified as unknown type".to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_flask_as_web() {
        let files = vec![("app.py".to_string(), "from flask import Flask\napp = Flask(__name__)\n".to_string())];
        let (app_type, note) = classify(&files);
        assert_eq!(app_type, AppType::Web);
        assert!(note.is_none());
    }

    #[test]
    fn detects_argparse_as_script_or_cli() {
        let files = vec![("main.py".to_string(), "import argparse\n".to_string())];
        let (app_type, _) = classify(&files);
        assert_eq!(app_type, AppType::ScriptOrCli);
    }

    #[test]
    fn no_marker_reports_unknown_with_explicit_note() {
        let files = vec![("lib.py".to_string(), "def helper():\n    return 1\n".to_string())];
        let (app_type, note) = classify(&files);
        assert_eq!(app_type, AppType::Unknown);
        assert!(note.is_some());
    }

    #[test]
    fn web_marker_takes_precedence_over_script_marker_when_both_present() {
        let files = vec![(
            "app.py".to_string(),
            "from flask import Flask\nif __name__ == '__main__':\n    pass\n".to_string(),
        )];
        let (app_type, _) = classify(&files);
        assert_eq!(app_type, AppType::Web);
    }
}
