//! PDF merge strategies.
//!
//! Strategies are tried in order by the assembler. Each reports a typed
//! outcome instead of failing the run: `Unavailable` when the capability is
//! missing on this machine, `Failed` when it could not handle these inputs.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use folio_core::FolioError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged,
    Unavailable(String),
    Failed(String),
}

impl MergeOutcome {
    fn unavailable(what: &str) -> Self {
        MergeOutcome::Unavailable(FolioError::MergeCapabilityUnavailable(what.to_string()).to_string())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MergeOutcome::Merged => "merged",
            MergeOutcome::Unavailable(_) => "unavailable",
            MergeOutcome::Failed(_) => "failed",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            MergeOutcome::Merged => "",
            MergeOutcome::Unavailable(d) | MergeOutcome::Failed(d) => d,
        }
    }
}

/// Combines ordered PDFs into one file. Implementations block.
pub trait MergeStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn merge(&self, inputs: &[PathBuf], output: &Path) -> MergeOutcome;
}

/// In-process merge with `lopdf`. Page dictionaries are carried over intact,
/// so link annotations survive.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfMerger;

impl MergeStrategy for LopdfMerger {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    #[cfg(feature = "lopdf-merge")]
    fn merge(&self, inputs: &[PathBuf], output: &Path) -> MergeOutcome {
        match lopdf_impl::merge(inputs, output) {
            Ok(pages) => {
                tracing::debug!(pages, output = %output.display(), "lopdf merge complete");
                MergeOutcome::Merged
            }
            Err(e) => MergeOutcome::Failed(e),
        }
    }

    #[cfg(not(feature = "lopdf-merge"))]
    fn merge(&self, _inputs: &[PathBuf], _output: &Path) -> MergeOutcome {
        MergeOutcome::unavailable("built without the lopdf-merge feature")
    }
}

#[cfg(feature = "lopdf-merge")]
mod lopdf_impl {
    use std::path::{Path, PathBuf};

    use lopdf::{Document, Object, ObjectId};

    pub(super) fn merge(inputs: &[PathBuf], output: &Path) -> Result<usize, String> {
        let mut max_id = 1;
        let mut pages: Vec<(ObjectId, Object)> = Vec::new();
        let mut objects: Vec<(ObjectId, Object)> = Vec::new();

        for input in inputs {
            let mut doc = Document::load(input).map_err(|e| format!("{}: {}", input.display(), e))?;
            doc.renumber_objects_with(max_id);
            max_id = doc.max_id + 1;

            for (_, page_id) in doc.get_pages() {
                let page = doc
                    .get_object(page_id)
                    .map_err(|e| format!("{}: {}", input.display(), e))?;
                pages.push((page_id, page.to_owned()));
            }
            objects.extend(doc.objects);
        }

        let mut merged = Document::with_version("1.5");
        let mut catalog: Option<(ObjectId, Object)> = None;
        let mut pages_root: Option<(ObjectId, lopdf::Dictionary)> = None;

        for (id, object) in objects {
            let type_name = object.type_name().unwrap_or("").to_string();
            match type_name.as_str() {
                "Catalog" => {
                    if catalog.is_none() {
                        catalog = Some((id, object));
                    }
                }
                "Pages" => {
                    if let Ok(dict) = object.as_dict() {
                        match pages_root.as_mut() {
                            Some((_, existing)) => existing.extend(dict),
                            None => pages_root = Some((id, dict.clone())),
                        }
                    }
                }
                "Page" | "Outlines" | "Outline" => {}
                _ => {
                    merged.objects.insert(id, object);
                }
            }
        }

        let (pages_id, mut pages_dict) = pages_root.ok_or("no page tree found")?;
        let (catalog_id, catalog_obj) = catalog.ok_or("no document catalog found")?;

        let page_count = pages.len();
        let mut kids = Vec::with_capacity(page_count);
        for (id, page) in pages {
            if let Ok(dict) = page.as_dict() {
                let mut dict = dict.clone();
                dict.set("Parent", pages_id);
                merged.objects.insert(id, Object::Dictionary(dict));
                kids.push(Object::Reference(id));
            }
        }

        pages_dict.set("Count", page_count as i64);
        pages_dict.set("Kids", kids);
        merged.objects.insert(pages_id, Object::Dictionary(pages_dict));

        let mut catalog_dict = catalog_obj
            .as_dict()
            .map_err(|e| format!("catalog: {}", e))?
            .clone();
        catalog_dict.set("Pages", pages_id);
        catalog_dict.remove(b"Outlines");
        merged.objects.insert(catalog_id, Object::Dictionary(catalog_dict));

        merged.trailer.set("Root", catalog_id);
        merged.max_id = merged.objects.len() as u32;
        merged.renumber_objects();
        merged.adjust_zero_pages();
        merged.compress();
        merged
            .save(output)
            .map_err(|e| format!("{}: {}", output.display(), e))?;
        Ok(page_count)
    }
}

/// Ghostscript `pdfwrite`. Drops most annotations.
#[derive(Debug, Clone)]
pub struct GhostscriptMerger {
    program: String,
}

impl Default for GhostscriptMerger {
    fn default() -> Self {
        Self {
            program: "gs".to_string(),
        }
    }
}

impl GhostscriptMerger {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl MergeStrategy for GhostscriptMerger {
    fn name(&self) -> &'static str {
        "ghostscript"
    }

    fn merge(&self, inputs: &[PathBuf], output: &Path) -> MergeOutcome {
        if !self.available() {
            return MergeOutcome::unavailable(&format!("{} not found on PATH", self.program));
        }
        let result = Command::new(&self.program)
            .args(["-dBATCH", "-dNOPAUSE", "-q", "-sDEVICE=pdfwrite"])
            .arg(format!("-sOutputFile={}", output.display()))
            .args(inputs)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();

        match result {
            Ok(out) if out.status.success() && output.is_file() => MergeOutcome::Merged,
            Ok(out) => MergeOutcome::Failed(format!(
                "{} exited with {}: {}",
                self.program,
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )),
            Err(e) => MergeOutcome::Failed(e.to_string()),
        }
    }
}

/// Last resort: a text listing of what would have been merged.
pub fn write_manifest(inputs: &[PathBuf], output: &Path) -> std::io::Result<()> {
    let mut file = fs::File::create(output)?;
    writeln!(file, "PDF MANIFEST")?;
    writeln!(file, "No PDF merger was available; files listed in assembly order.")?;
    writeln!(file, "Total files: {}", inputs.len())?;
    writeln!(file)?;
    for (i, input) in inputs.iter().enumerate() {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let size = fs::metadata(input).map(|m| m.len()).unwrap_or(0);
        writeln!(file, "{:>3}. {}", i + 1, name)?;
        writeln!(file, "     path: {}", input.display())?;
        writeln!(file, "     size: {} bytes", size)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ghostscript_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let gs = GhostscriptMerger::with_program("folio-no-such-gs");
        let outcome = gs.merge(&[], &dir.path().join("out.pdf"));
        assert!(matches!(outcome, MergeOutcome::Unavailable(_)));
        assert_eq!(outcome.as_str(), "unavailable");
    }

    #[test]
    fn manifest_lists_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        fs::write(&a, b"12345").unwrap();
        fs::write(&b, b"1").unwrap();
        let out = dir.path().join("manifest.txt");

        write_manifest(&[b.clone(), a.clone()], &out).unwrap();
        let text = fs::read_to_string(&out).unwrap();
        assert!(text.contains("Total files: 2"));
        let b_pos = text.find("b.pdf").unwrap();
        let a_pos = text.find("a.pdf").unwrap();
        assert!(b_pos < a_pos);
        assert!(text.contains("size: 5 bytes"));
    }

    #[cfg(feature = "lopdf-merge")]
    #[test]
    fn lopdf_rejects_non_pdf_input() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.pdf");
        fs::write(&bogus, b"not a pdf").unwrap();
        let outcome = LopdfMerger.merge(&[bogus], &dir.path().join("out.pdf"));
        assert!(matches!(outcome, MergeOutcome::Failed(_)));
    }
}
