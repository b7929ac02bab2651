//! Plain-text system prompt rendering.
//!
//! Each non-empty layer becomes a `[Header]` block; blocks are joined by a
//! blank line. Layers render in a fixed order so identical windows always
//! produce identical prompts.

use contextweave_core::{
    DynamicContext, GoalProfile, KnowledgeReference, MetaContext, PersonaProfile, PlanNode,
    PolicyRule, PromptComposer, PromptInput, StaticContext,
};
use contextweave_registry::sop_ref_label;

const DEFAULT_VOICE: &str =
    "You are a focused engineering assistant. Prefer secure, testable, incremental changes.";

/// The built-in [`PromptComposer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPromptComposer;

impl PromptComposer for DefaultPromptComposer {
    fn compose(&self, input: &PromptInput<'_>) -> String {
        let mut sections = vec![
            identity_section(&input.static_context.persona),
            goals_section(&input.static_context.goal),
            policies_section(&input.static_context.policies),
            knowledge_section(&input.static_context.knowledge),
        ];
        if !input.omit_environment {
            sections.push(environment_section(input.static_context));
        }
        sections.push(dynamic_section(input.dynamic));
        sections.push(meta_section(input.meta));

        sections
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

// ── Layers ────────────────────────────────────────────────────────────────

fn identity_section(persona: &PersonaProfile) -> String {
    let voice = match persona.voice.trim() {
        "" => DEFAULT_VOICE,
        voice => voice,
    };
    let mut lines = vec![voice.to_string()];
    for (key, value) in [
        ("Tone", &persona.tone),
        ("Decision Style", &persona.decision_style),
        ("Risk Profile", &persona.risk_profile),
    ] {
        if !value.trim().is_empty() {
            lines.push(format!("- {key}: {}", value.trim()));
        }
    }
    if !persona.taboo_topics.is_empty() {
        lines.push(format!("- Avoid: {}", persona.taboo_topics.join(", ")));
    }
    section("Identity & Persona", lines)
}

fn goals_section(goal: &GoalProfile) -> String {
    let mut lines = Vec::new();
    labelled_bullets(&mut lines, "Long-term", &goal.long_term, 0);
    labelled_bullets(&mut lines, "Mid-term", &goal.mid_term, 0);
    labelled_bullets(&mut lines, "Success metrics", &goal.success_metrics, 0);
    section("Mission Objectives", lines)
}

fn policies_section(policies: &[PolicyRule]) -> String {
    let mut lines = Vec::new();
    for policy in policies {
        if policy.hard_constraints.is_empty()
            && policy.soft_preferences.is_empty()
            && policy.reward_hooks.is_empty()
        {
            continue;
        }
        lines.push(format!("{}:", policy_label(&policy.id)));
        labelled_bullets(&mut lines, "Hard constraints", &policy.hard_constraints, 1);
        labelled_bullets(&mut lines, "Soft preferences", &policy.soft_preferences, 1);
        labelled_bullets(&mut lines, "Reward hooks", &policy.reward_hooks, 1);
    }
    section("Guardrails & Policies", lines)
}

fn knowledge_section(knowledge: &[KnowledgeReference]) -> String {
    let mut lines = Vec::new();
    for entry in knowledge {
        let label = [entry.id.trim(), entry.description.trim()]
            .into_iter()
            .find(|l| !l.is_empty())
            .unwrap_or("knowledge");
        lines.push(format!("{label}:"));
        if !entry.description.trim().is_empty() {
            lines.push(format!("  - Summary: {}", entry.description.trim()));
        }

        if entry.resolved_sop_content.is_empty() {
            if !entry.sop_refs.is_empty() {
                lines.push(format!("  - SOP refs: {}", entry.sop_refs.join(", ")));
            }
        } else {
            for reference in &entry.sop_refs {
                let Some(content) = entry
                    .resolved_sop_content
                    .get(reference)
                    .filter(|c| !c.is_empty())
                else {
                    continue;
                };
                lines.push(format!("  - SOP [{}]:", sop_ref_label(reference)));
                lines.extend(content.lines().map(|line| format!("    {line}")));
            }
        }

        if !entry.rag_collections.is_empty() {
            lines.push(format!("  - RAG collections: {}", entry.rag_collections.join(", ")));
        }
        if !entry.memory_keys.is_empty() {
            lines.push(format!("  - Memory keys: {}", entry.memory_keys.join(", ")));
        }
    }
    section("Knowledge & Experience", lines)
}

fn environment_section(static_context: &StaticContext) -> String {
    let world = &static_context.world;
    let mut lines = Vec::new();
    let summary = static_context.environment_summary.trim();
    if !summary.is_empty() {
        lines.push(format!("Environment summary: {summary}"));
    }
    if !world.environment.trim().is_empty() {
        lines.push(format!("World: {}", world.environment.trim()));
    }
    for (label, items) in [
        ("Capabilities", &world.capabilities),
        ("Limits", &world.limits),
        ("Cost awareness", &world.cost_model),
        ("Tool access", &static_context.tools),
    ] {
        if !items.is_empty() {
            lines.push(format!("{label}: {}", items.join(", ")));
        }
    }
    section("Operating Environment", lines)
}

fn dynamic_section(dynamic: &DynamicContext) -> String {
    let mut lines = Vec::new();
    if dynamic.turn_id > 0 || dynamic.llm_turn_seq > 0 {
        lines.push(format!(
            "Turn: {} (llm_seq={})",
            dynamic.turn_id, dynamic.llm_turn_seq
        ));
    }
    if let Some(ts) = dynamic.snapshot_timestamp {
        lines.push(format!("Snapshot captured: {}", ts.to_rfc3339()));
    }
    if !dynamic.plans.is_empty() {
        lines.push("Plans:".into());
        plan_tree(&mut lines, &dynamic.plans, 1);
    }
    if !dynamic.beliefs.is_empty() {
        lines.push("Beliefs:".into());
        lines.extend(dynamic.beliefs.iter().map(|b| {
            format!("  - {} (confidence {:.2})", b.statement.trim(), b.confidence)
        }));
    }
    if !dynamic.world_state.is_empty() {
        lines.push("World state summary:".into());
        lines.extend(
            dynamic
                .world_state
                .iter()
                .map(|(key, value)| format!("  - {key}: {value}")),
        );
    }
    if !dynamic.feedback.is_empty() {
        lines.push("Feedback signals:".into());
        lines.extend(dynamic.feedback.iter().map(|signal| {
            format!("  - {}: {} ({:.2})", signal.kind, signal.message, signal.value)
        }));
    }
    section("Live Session State", lines)
}

fn meta_section(meta: &MetaContext) -> String {
    let mut lines = Vec::new();
    if !meta.persona_version.is_empty() {
        lines.push(format!("Persona version: {}", meta.persona_version));
    }
    if !meta.memories.is_empty() {
        lines.push("Memories:".into());
        for memory in &meta.memories {
            lines.push(format!(
                "  - {} ({}, {})",
                memory.key,
                memory.source,
                memory.created_at.format("%Y-%m-%d")
            ));
            lines.extend(memory.content.lines().map(|line| format!("    {line}")));
        }
    }
    if !meta.recommendations.is_empty() {
        lines.push("Recommendations:".into());
        lines.extend(meta.recommendations.iter().map(|r| format!("  - {r}")));
    }
    section("Meta Stewardship Directives", lines)
}

// ── Formatting helpers ────────────────────────────────────────────────────

fn section(title: &str, lines: Vec<String>) -> String {
    let body: Vec<String> = lines
        .into_iter()
        .filter(|l| !l.trim().is_empty())
        .collect();
    if body.is_empty() {
        return String::new();
    }
    format!("[{title}]\n{}", body.join("\n"))
}

/// `Label:` followed by indented bullets; nothing for an empty list.
fn labelled_bullets(lines: &mut Vec<String>, label: &str, items: &[String], depth: usize) {
    let items: Vec<&str> = items
        .iter()
        .map(|i| i.trim())
        .filter(|i| !i.is_empty())
        .collect();
    if items.is_empty() {
        return;
    }
    let indent = "  ".repeat(depth);
    lines.push(format!("{indent}{label}:"));
    lines.extend(items.iter().map(|item| format!("{indent}  - {item}")));
}

fn plan_tree(lines: &mut Vec<String>, nodes: &[PlanNode], depth: usize) {
    for node in nodes {
        let mut entry = if node.title.trim().is_empty() {
            node.id.clone()
        } else {
            node.title.trim().to_string()
        };
        if !node.status.is_empty() {
            entry.push_str(&format!(" [{}]", node.status));
        }
        if !node.description.is_empty() {
            entry.push_str(&format!(": {}", node.description));
        }
        lines.push(format!("{}- {}", "  ".repeat(depth), entry.trim()));
        plan_tree(lines, &node.children, depth + 1);
    }
}

fn policy_label(id: &str) -> String {
    let mut chars = id.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Policy".into(),
    }
}
