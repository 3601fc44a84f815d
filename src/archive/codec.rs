//! Export and import of `.guideme` documents.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use url::Url;

use super::category::{infer_category, infer_tags};
use super::collection::ArchiveEntry;
use super::format::*;
use super::ImportError;
use crate::dom::Quadrant;
use crate::fingerprint::is_scan_id;
use crate::guide::{page_pattern, GuideSession, Step, StepAction};
use crate::synth::SelectorBundle;

/// Seconds budgeted per step for `estimatedTime`.
pub const SECONDS_PER_STEP: u64 = 5;
const DEFAULT_AUTHOR: &str = "guideme";
const TESTED_ON: &str = "chromium";

/// A successfully imported guide plus non-fatal findings.
#[derive(Debug, Clone)]
pub struct ImportedGuide {
    pub entry: ArchiveEntry,
    pub warnings: Vec<String>,
    /// False when the embedded checksum did not match the content.
    pub checksum_ok: bool,
}

impl ImportedGuide {
    /// Replay session for the imported steps.
    pub fn session(&self) -> GuideSession {
        let mut session = GuideSession::replay(self.entry.task.clone(), self.entry.steps.clone(), false);
        session.saved_guide_id = Some(self.entry.id.clone());
        session.start_url = self.entry.start_url.clone();
        session
    }
}

/// `sha256:<hex>` over the compact JSON of `document` without its
/// `checksum` and `signature` fields. Object keys serialize sorted.
pub fn compute_checksum(document: &Value) -> String {
    let mut body = document.clone();
    if let Some(map) = body.as_object_mut() {
        map.remove("checksum");
        map.remove("signature");
    }
    let canonical = body.to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    format!("{}{:x}", CHECKSUM_PREFIX, digest)
}

fn signal_value(kind: &str, value: &Option<String>) -> Option<TargetSignal> {
    value.as_deref().map(|v| TargetSignal::new(kind, v))
}

/// Primary is the strongest of testid, aria-label and css; the rest are
/// fallbacks in resolver order.
pub(crate) fn target_from_step(step: &Step) -> Option<ArchiveTarget> {
    let mut signals: Vec<TargetSignal> = Vec::new();
    if let Some(b) = &step.selector_bundle {
        let b = b.clone().normalized();
        signals.extend(signal_value("testid", &b.data_test_id));
        signals.extend(signal_value("aria-label", &b.aria_label));
        signals.extend(signal_value("css", &b.css_selector));
        signals.extend(signal_value("id", &b.id));
        signals.extend(signal_value("name", &b.name));
        signals.extend(signal_value("text", &b.text_content));
        signals.extend(signal_value("tag", &b.tag_name));
        signals.extend(signal_value("role", &b.role));
        signals.extend(signal_value("placeholder", &b.placeholder));
        signals.extend(signal_value("href", &b.href_path));
        signals.extend(signal_value("parent", &b.parent_context));
        if let Some(index) = b.sibling_index {
            signals.push(TargetSignal {
                count: b.sibling_count,
                ..TargetSignal::new("sibling", index.to_string())
            });
        }
        if let Some(quadrant) = b.quadrant {
            if let Ok(Value::String(q)) = serde_json::to_value(quadrant) {
                signals.push(TargetSignal::new("quadrant", q));
            }
        }
    }
    // scan ids do not survive a reload, only free-text refs are worth keeping
    if let Some(reference) = step.legacy_element_ref.as_deref() {
        if !is_scan_id(reference) && !reference.trim().is_empty() {
            signals.push(TargetSignal::new("ref", reference.trim()));
        }
    }

    let primary_pos = signals
        .iter()
        .position(|s| matches!(s.kind.as_str(), "testid" | "aria-label" | "css"))
        .unwrap_or(0);
    if signals.is_empty() {
        return None;
    }
    let primary = signals.remove(primary_pos);
    Some(ArchiveTarget {
        primary,
        fallbacks: signals,
    })
}

fn apply_signal(step: &mut Step, bundle: &mut SelectorBundle, signal: &TargetSignal, warnings: &mut Vec<String>) {
    let value = Some(signal.value.clone());
    match signal.kind.as_str() {
        "testid" => bundle.data_test_id = value,
        "aria-label" => bundle.aria_label = value,
        "css" => bundle.css_selector = value,
        "id" => bundle.id = value,
        "name" => bundle.name = value,
        "text" => bundle.text_content = value,
        "tag" => bundle.tag_name = value,
        "role" => bundle.role = value,
        "placeholder" => bundle.placeholder = value,
        "href" => bundle.href_path = value,
        "parent" => bundle.parent_context = value,
        "sibling" => {
            bundle.sibling_index = signal.value.parse().ok();
            bundle.sibling_count = signal.count;
        }
        "quadrant" => {
            bundle.quadrant =
                serde_json::from_value::<Quadrant>(Value::String(signal.value.clone())).ok();
        }
        "ref" => step.legacy_element_ref = value,
        other => warnings.push(format!("ignored unknown target type \"{}\"", other)),
    }
}

fn step_from_archive(archived: &ArchiveStep, ordinal: usize, warnings: &mut Vec<String>) -> Step {
    let mut step = Step::new(archived.instruction.trim(), StepAction::parse_lenient(&archived.action));
    step.value = archived.value.clone();
    step.page_url_pattern = archived.page.clone();

    if let Some(target) = &archived.target {
        let mut bundle = SelectorBundle::default();
        for signal in std::iter::once(&target.primary).chain(target.fallbacks.iter()) {
            apply_signal(&mut step, &mut bundle, signal, warnings);
        }
        let bundle = bundle.normalized();
        if !bundle.is_empty() {
            step.selector_bundle = Some(bundle);
        }
    }

    if step.description.is_empty() && archived.target.is_none() {
        warnings.push(format!("step {} has neither an instruction nor a target", ordinal));
    }
    if step.description.is_empty() {
        step.description = format!("Step {}", ordinal);
    }
    step
}

fn origin_of(url: Option<&str>) -> String {
    url.and_then(|u| Url::parse(u).ok())
        .map(|u| u.origin().ascii_serialization())
        .filter(|o| o != "null")
        .unwrap_or_default()
}

/// Build the archive document for a saved guide.
pub fn export_entry(entry: &ArchiveEntry, now: DateTime<Utc>) -> ArchiveDocument {
    let mut url_patterns: Vec<String> = Vec::new();
    let start_pattern = entry.start_url.as_deref().and_then(page_pattern);
    for pattern in start_pattern
        .into_iter()
        .chain(entry.steps.iter().filter_map(|s| s.page_url_pattern.clone()))
    {
        if !url_patterns.contains(&pattern) {
            url_patterns.push(pattern);
        }
    }

    let steps: Vec<ArchiveStep> = entry
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| ArchiveStep {
            id: format!("step-{}", i + 1),
            instruction: step.description.clone(),
            action: step.action.as_str().to_string(),
            value: step.value.clone(),
            target: target_from_step(step),
            page: step.page_url_pattern.clone(),
        })
        .collect();

    let mut document = ArchiveDocument {
        schema: SCHEMA_URL.to_string(),
        version: FORMAT_VERSION.to_string(),
        format: FORMAT_ID.to_string(),
        metadata: ArchiveMetadata {
            id: entry.id.clone(),
            name: entry.name.clone(),
            description: entry.task.clone(),
            author: DEFAULT_AUTHOR.to_string(),
            created: entry.created_at.to_rfc3339(),
            updated: now.to_rfc3339(),
            website: origin_of(entry.start_url.as_deref()),
            category: infer_category(&entry.task),
            tags: infer_tags(&entry.task),
            language: "en".to_string(),
            estimated_time: SECONDS_PER_STEP * entry.steps.len() as u64,
        },
        compatibility: Compatibility {
            url_patterns,
            min_version: FORMAT_VERSION.to_string(),
            tested_on: TESTED_ON.to_string(),
        },
        steps,
        checksum: String::new(),
        signature: None,
    };
    document.checksum = match serde_json::to_value(&document) {
        Ok(value) => compute_checksum(&value),
        Err(e) => {
            log::warn!("could not checksum archive {}: {}", entry.id, e);
            String::new()
        }
    };
    document
}

/// Export the steps of a live or finished session.
pub fn export_session(session: &GuideSession, name: &str, now: DateTime<Utc>) -> ArchiveDocument {
    let steps = if session.all_steps_for_saving.is_empty() {
        session.steps.clone()
    } else {
        session.all_steps_for_saving.clone()
    };
    let entry = ArchiveEntry {
        id: session
            .saved_guide_id
            .clone()
            .unwrap_or_else(super::collection::new_guide_id),
        name: name.to_string(),
        task: session.original_task.clone(),
        steps,
        start_url: session.start_url.clone(),
        created_at: now,
        checksum: String::new(),
    };
    export_entry(&entry, now)
}

pub fn to_pretty_json(document: &ArchiveDocument) -> Result<String, ImportError> {
    serde_json::to_string_pretty(document).map_err(|e| ImportError::MalformedJson(e.to_string()))
}

fn major_version(version: &str) -> Option<u64> {
    version.trim().split('.').next()?.parse().ok()
}

/// Parse and validate raw `.guideme` text.
pub fn import(raw: &str) -> Result<ImportedGuide, ImportError> {
    let value: Value = serde_json::from_str(raw.trim_start_matches('\u{feff}'))
        .map_err(|e| ImportError::MalformedJson(e.to_string()))?;
    let Some(object) = value.as_object() else {
        return Err(ImportError::MalformedJson("top level is not an object".into()));
    };

    match object.get("format").and_then(Value::as_str) {
        Some(FORMAT_ID) => {}
        Some(other) => return Err(ImportError::WrongFormat(other.to_string())),
        None => return Err(ImportError::MissingFormat),
    }

    let mut warnings = Vec::new();
    match object.get("version").and_then(Value::as_str) {
        Some(version) => {
            let supported = major_version(FORMAT_VERSION);
            if major_version(version) != supported {
                return Err(ImportError::UnsupportedVersion {
                    found: version.to_string(),
                    supported: FORMAT_VERSION.to_string(),
                });
            }
            if version != FORMAT_VERSION {
                warnings.push(format!("archive version {} differs from {}", version, FORMAT_VERSION));
            }
        }
        None => warnings.push(format!("no version, assuming {}", FORMAT_VERSION)),
    }

    let metadata = object.get("metadata").cloned().unwrap_or(Value::Null);
    let name = metadata
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(ImportError::MissingName)?
        .to_string();

    let raw_steps = object
        .get("steps")
        .and_then(Value::as_array)
        .filter(|s| !s.is_empty())
        .ok_or(ImportError::NoSteps)?;

    let mut steps = Vec::with_capacity(raw_steps.len());
    for (i, raw_step) in raw_steps.iter().enumerate() {
        let archived: ArchiveStep = serde_json::from_value(raw_step.clone())
            .map_err(|e| ImportError::MalformedJson(format!("step {}: {}", i + 1, e)))?;
        steps.push(step_from_archive(&archived, i + 1, &mut warnings));
    }

    let embedded = object.get("checksum").and_then(Value::as_str).unwrap_or("");
    let computed = compute_checksum(&value);
    let checksum_ok = embedded == computed;
    if embedded.is_empty() {
        warnings.push("archive carries no checksum".to_string());
    } else if !checksum_ok {
        warnings.push("checksum mismatch, the file was modified after export".to_string());
    }

    let task = metadata
        .get("description")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(name.as_str())
        .to_string();
    let created_at = metadata
        .get("created")
        .and_then(Value::as_str)
        .and_then(|c| DateTime::parse_from_rfc3339(c).ok())
        .map(|c| c.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    let id = metadata
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(super::collection::new_guide_id);
    let start_url = metadata
        .get("website")
        .and_then(Value::as_str)
        .filter(|w| !w.is_empty())
        .map(str::to_string);

    let mut entry = ArchiveEntry {
        id,
        name,
        task,
        steps,
        start_url,
        created_at,
        checksum: String::new(),
    };
    entry.checksum = entry.content_checksum();
    log::info!("imported guide \"{}\" with {} steps", entry.name, entry.steps.len());

    Ok(ImportedGuide {
        entry,
        warnings,
        checksum_ok,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> ArchiveEntry {
        let steps = vec![
            Step::new("Click \"Settings\"", StepAction::Click)
                .with_bundle(SelectorBundle {
                    aria_label: Some("Settings".into()),
                    tag_name: Some("a".into()),
                    sibling_index: Some(2),
                    sibling_count: Some(4),
                    quadrant: Some(Quadrant::TopRight),
                    ..Default::default()
                })
                .on_page("https://example.com/home"),
            Step::new("Type your name", StepAction::Type)
                .with_value("Ada")
                .with_bundle(SelectorBundle {
                    name: Some("display_name".into()),
                    ..Default::default()
                }),
        ];
        ArchiveEntry {
            id: "guide_1_abc".into(),
            name: "Rename".into(),
            task: "change my profile name".into(),
            steps,
            start_url: Some("https://example.com/home".into()),
            created_at: Utc::now(),
            checksum: String::new(),
        }
    }

    #[test]
    fn test_export_layout() {
        let document = export_entry(&entry(), Utc::now());
        assert_eq!(document.format, "guideme");
        assert_eq!(document.version, "1.0");
        assert_eq!(document.metadata.estimated_time, 10);
        assert_eq!(document.metadata.category, "account");
        assert_eq!(document.metadata.website, "https://example.com");
        assert_eq!(document.compatibility.url_patterns, vec!["example.com/home"]);
        let target = document.steps[0].target.as_ref().unwrap();
        assert_eq!(target.primary, TargetSignal::new("aria-label", "Settings"));
        // name is not a primary kind, so the first signal is promoted
        let second = document.steps[1].target.as_ref().unwrap();
        assert_eq!(second.primary.kind, "name");
        assert!(document.checksum.starts_with("sha256:"));
        assert!(document.signature.is_none());

        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(json["$schema"], SCHEMA_URL);
        assert_eq!(json["metadata"]["estimatedTime"], 10);
    }

    #[test]
    fn test_import_restores_bundles() {
        let original = entry();
        let text = to_pretty_json(&export_entry(&original, Utc::now())).unwrap();
        let imported = import(&text).unwrap();
        assert!(imported.checksum_ok);
        assert!(imported.warnings.is_empty(), "{:?}", imported.warnings);
        assert_eq!(imported.entry.steps, original.steps);
        assert_eq!(imported.entry.task, original.task);
        let session = imported.session();
        assert!(session.is_replay_mode);
        assert!(!session.uses_planner());
    }

    #[test]
    fn test_tampered_checksum_is_a_warning() {
        let text = to_pretty_json(&export_entry(&entry(), Utc::now())).unwrap();
        let tampered = text.replace("Type your name", "Type your full name");
        let imported = import(&tampered).unwrap();
        assert!(!imported.checksum_ok);
        assert_eq!(imported.warnings.len(), 1);
        assert_eq!(imported.entry.steps[1].description, "Type your full name");
    }

    #[test]
    fn test_import_rejections() {
        assert!(matches!(import("{nope"), Err(ImportError::MalformedJson(_))));
        let err = import(r#"{"version": "1.0", "steps": []}"#).unwrap_err();
        assert!(err.to_string().contains("guideme"));
        assert!(matches!(
            import(r#"{"format": "guideme", "version": "2.0", "metadata": {"name": "x"}, "steps": [{"id": "1"}]}"#),
            Err(ImportError::UnsupportedVersion { .. })
        ));
        assert!(matches!(
            import(r#"{"format": "guideme", "version": "1.0", "metadata": {}, "steps": [{"id": "1"}]}"#),
            Err(ImportError::MissingName)
        ));
        assert!(matches!(
            import(r#"{"format": "guideme", "version": "1.0", "metadata": {"name": "x"}, "steps": []}"#),
            Err(ImportError::NoSteps)
        ));
    }

    #[test]
    fn test_sparse_step_warns() {
        let raw = r#"{"format": "guideme", "version": "1.2", "metadata": {"name": "x"},
            "steps": [{"id": "s1", "target": {"primary": {"type": "shadow", "value": "?"}}}, {"id": "s2"}]}"#;
        let imported = import(raw).unwrap();
        assert_eq!(imported.entry.steps[1].description, "Step 2");
        assert_eq!(imported.entry.task, "x");
        // version drift, unknown type, empty step, no checksum
        assert_eq!(imported.warnings.len(), 4, "{:?}", imported.warnings);
    }
}
