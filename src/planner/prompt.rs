//! Prompt rendering for text-in, text-out planners.

use std::fmt::Write;

use super::PlannerRequest;
use crate::fingerprint::ElementDescriptor;

const OUTPUT_CONTRACT: &str = r#"Respond with ONLY a JSON object, no prose and no markdown:
{
  "steps": [
    {"elementId": "gm-12", "action": "click", "description": "Click \"Settings\" in the top menu"},
    {"elementId": "gm-15", "action": "type", "value": "text to enter", "description": "Type your new display name"}
  ],
  "canComplete": false,
  "completed": false,
  "note": "optional short remark"
}

Rules:
- Only use elementId values from the element list above.
- action is one of: click, type, select, focus, info.
- Quote the element's visible text in the description, e.g. Click "Save".
- Plan only steps possible on THIS page; the next page is planned after navigation.
- Set "completed" to true only when these steps finish the whole task.
- Set "canComplete" to true when the task can be finished on this page."#;

fn describe_element(out: &mut String, element: &ElementDescriptor) {
    let _ = write!(
        out,
        "[{}] {} \"{}\" ({})",
        element.id,
        element.element_type,
        element.text,
        element.location.as_str()
    );
    if !element.hints.is_empty() {
        let hints: Vec<&str> = element.hints.iter().map(String::as_str).collect();
        let _ = write!(out, " {{{}}}", hints.join(", "));
    }
    if let Some(heading) = &element.nearby_heading {
        let _ = write!(out, " under \"{}\"", heading);
    }
    out.push('\n');
}

/// Render a request into a single prompt with a strict JSON output contract.
pub fn build_prompt(request: &PlannerRequest) -> String {
    let mut out = String::new();
    out.push_str("You are guiding a user through a website one step at a time.\n\n");
    let _ = writeln!(out, "TASK: {}", request.task);
    let _ = writeln!(out, "URL: {}", request.url);
    let _ = writeln!(out, "TITLE: {}", request.title);

    if let Some(ctx) = &request.page_context {
        let _ = write!(out, "PAGE: type={:?}", ctx.page_type);
        if let Some(platform) = &ctx.platform {
            let _ = write!(out, " platform={}", platform);
        }
        if ctx.has_open_modal {
            out.push_str(" modal-open");
        }
        if ctx.has_open_dropdown {
            out.push_str(" dropdown-open");
        }
        if ctx.is_loading {
            out.push_str(" loading");
        }
        out.push('\n');
        if !ctx.headings.is_empty() {
            let _ = writeln!(out, "HEADINGS: {}", ctx.headings.join(" | "));
        }
    }

    if !request.completed_steps.is_empty() {
        out.push_str("\nALREADY DONE:\n");
        for (i, step) in request.completed_steps.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, step.description);
        }
    }

    let _ = writeln!(out, "\nELEMENTS ({}):", request.elements.len());
    for element in &request.elements {
        describe_element(&mut out, element);
    }

    out.push('\n');
    out.push_str(OUTPUT_CONTRACT);
    out.push('\n');
    out
}
