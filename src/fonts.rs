//! Font discovery for the PDF report.
//!
//! `genpdf` embeds TrueType fonts, so a complete family (regular, bold, italic, bold italic)
//! must be found on disk. The search order is:
//!
//! 1. the directory named by `KPI_REPORT_FONTS_DIR` (any known family),
//! 2. `assets/fonts` next to the running executable (Roboto),
//! 3. `assets/fonts` inside this crate (Roboto),
//! 4. common system locations for Liberation Sans, DejaVu Sans, and Windows Arial.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use genpdf::error::Error;
use genpdf::fonts::{FontData, FontFamily};
use log::{debug, warn};

/// Environment variable pointing at a directory with a complete font family.
pub const FONTS_DIR_ENV: &str = "KPI_REPORT_FONTS_DIR";

/// Name of the bundled font family.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "Roboto";

/// File names making up one font family.
#[derive(Debug)]
pub struct FamilyFiles {
    pub name: &'static str,
    regular: &'static str,
    bold: &'static str,
    italic: &'static str,
    bold_italic: &'static str,
}

impl FamilyFiles {
    fn files(&self) -> [&'static str; 4] {
        [self.regular, self.bold, self.italic, self.bold_italic]
    }
}

const ROBOTO: FamilyFiles = FamilyFiles {
    name: DEFAULT_FONT_FAMILY_NAME,
    regular: "Roboto-Regular.ttf",
    bold: "Roboto-Bold.ttf",
    italic: "Roboto-Italic.ttf",
    bold_italic: "Roboto-BoldItalic.ttf",
};

const LIBERATION_SANS: FamilyFiles = FamilyFiles {
    name: "Liberation Sans",
    regular: "LiberationSans-Regular.ttf",
    bold: "LiberationSans-Bold.ttf",
    italic: "LiberationSans-Italic.ttf",
    bold_italic: "LiberationSans-BoldItalic.ttf",
};

const DEJAVU_SANS: FamilyFiles = FamilyFiles {
    name: "DejaVu Sans",
    regular: "DejaVuSans.ttf",
    bold: "DejaVuSans-Bold.ttf",
    italic: "DejaVuSans-Oblique.ttf",
    bold_italic: "DejaVuSans-BoldOblique.ttf",
};

const ARIAL: FamilyFiles = FamilyFiles {
    name: "Arial",
    regular: "arial.ttf",
    bold: "arialbd.ttf",
    italic: "ariali.ttf",
    bold_italic: "arialbi.ttf",
};

const KNOWN_FAMILIES: [&FamilyFiles; 4] = [&ROBOTO, &LIBERATION_SANS, &DEJAVU_SANS, &ARIAL];

const SYSTEM_DIRECTORIES: &[(&str, &FamilyFiles)] = &[
    ("/usr/share/fonts/truetype/liberation", &LIBERATION_SANS),
    ("/usr/share/fonts/liberation-sans", &LIBERATION_SANS),
    ("/usr/share/fonts/truetype/dejavu", &DEJAVU_SANS),
    ("/usr/share/fonts/dejavu", &DEJAVU_SANS),
    ("/Library/Fonts", &ARIAL),
];

/// A directory that may hold a given family.
#[derive(Debug)]
pub struct FontCandidate {
    pub directory: PathBuf,
    pub family: &'static FamilyFiles,
}

impl FontCandidate {
    fn new(directory: PathBuf, family: &'static FamilyFiles) -> Self {
        Self { directory, family }
    }

    /// Path of the regular face, used for chart text.
    pub fn regular_path(&self) -> PathBuf {
        self.directory.join(self.family.regular)
    }

    fn missing_files(&self) -> Vec<&'static str> {
        self.family
            .files()
            .into_iter()
            .filter(|name| !self.directory.join(name).is_file())
            .collect()
    }
}

/// Directory holding the fonts that ship with the crate sources.
pub fn bundled_fonts_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts")
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
}

fn font_candidates() -> Vec<FontCandidate> {
    let mut candidates = Vec::new();

    if let Some(directory) = env_path(FONTS_DIR_ENV) {
        for family in KNOWN_FAMILIES {
            candidates.push(FontCandidate::new(directory.clone(), family));
        }
    }

    if let Some(bin_dir) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(FontCandidate::new(bin_dir.join("assets/fonts"), &ROBOTO));
    }
    candidates.push(FontCandidate::new(bundled_fonts_dir(), &ROBOTO));

    for &(directory, family) in SYSTEM_DIRECTORIES {
        candidates.push(FontCandidate::new(PathBuf::from(directory), family));
    }

    #[cfg(windows)]
    {
        for var in ["WINDIR", "SystemRoot"] {
            if let Some(root) = env_path(var) {
                candidates.push(FontCandidate::new(root.join("Fonts"), &ARIAL));
            }
        }
    }

    candidates
}

/// Returns the first candidate holding a complete family, or a summary of every attempt.
pub fn resolve_font_candidate() -> Result<FontCandidate, Error> {
    let mut attempts = Vec::new();

    for candidate in font_candidates() {
        if !candidate.directory.is_dir() {
            attempts.push(format!(
                "{} ({}: directory missing)",
                candidate.directory.display(),
                candidate.family.name
            ));
            continue;
        }
        let missing = candidate.missing_files();
        if missing.is_empty() {
            return Ok(candidate);
        }
        attempts.push(format!(
            "{} ({}: missing [{}])",
            candidate.directory.display(),
            candidate.family.name,
            missing.join(", ")
        ));
    }

    Err(Error::new(
        format!(
            "Unable to locate a complete font family. Checked: {}. Set {} to a directory containing one.",
            attempts.join(", "),
            FONTS_DIR_ENV
        ),
        io::Error::new(io::ErrorKind::NotFound, "no usable font family found"),
    ))
}

fn load_font(directory: &Path, file: &str) -> Result<FontData, Error> {
    let path = directory.join(file);
    FontData::load(&path, None).map_err(|err| {
        Error::new(
            format!("Failed to load font {}: {}", path.display(), err),
            io::Error::new(io::ErrorKind::InvalidData, err.to_string()),
        )
    })
}

/// Loads the first complete font family found along the search path.
pub fn default_font_family() -> Result<FontFamily<FontData>, Error> {
    let candidate = resolve_font_candidate()?;
    if candidate.family.name != DEFAULT_FONT_FAMILY_NAME {
        warn!(
            "bundled {} fonts unavailable; using {} from {}",
            DEFAULT_FONT_FAMILY_NAME,
            candidate.family.name,
            candidate.directory.display()
        );
    } else {
        debug!("using fonts from {}", candidate.directory.display());
    }

    let family = candidate.family;
    let directory = candidate.directory.as_path();
    Ok(FontFamily {
        regular: load_font(directory, family.regular)?,
        bold: load_font(directory, family.bold)?,
        italic: load_font(directory, family.italic)?,
        bold_italic: load_font(directory, family.bold_italic)?,
    })
}

/// Whether any complete font family can be found.
pub fn default_fonts_available() -> bool {
    resolve_font_candidate().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_file_names_follow_genpdf_convention_for_roboto() {
        assert_eq!(
            ROBOTO.files(),
            [
                "Roboto-Regular.ttf",
                "Roboto-Bold.ttf",
                "Roboto-Italic.ttf",
                "Roboto-BoldItalic.ttf"
            ]
        );
    }

    #[test]
    fn empty_directory_reports_all_files_missing() {
        let dir = tempfile::tempdir().unwrap();
        let candidate = FontCandidate::new(dir.path().to_path_buf(), &DEJAVU_SANS);
        assert_eq!(candidate.missing_files().len(), 4);
    }

    #[test]
    fn regular_face_lives_in_the_candidate_directory() {
        let candidate = FontCandidate::new(PathBuf::from("fonts"), &LIBERATION_SANS);
        assert_eq!(
            candidate.regular_path(),
            Path::new("fonts/LiberationSans-Regular.ttf")
        );
    }

    #[test]
    fn bundled_directory_is_inside_the_crate() {
        assert!(bundled_fonts_dir().ends_with("assets/fonts"));
    }
}
