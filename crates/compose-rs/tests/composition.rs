use std::sync::{Arc, Mutex};

use compose_rs::compose::config::parse_sections;
use compose_rs::compose::context::ComposeContext;
use compose_rs::compose::resolver::resolve_order;
use compose_rs::prelude::*;
use compose_rs::template;
use serde_json::{Value, json};

fn subject() -> LoadedData {
    LoadedData::new(json!({"id": "c1", "name": "Ada Lovelace"}))
}

fn quiet(config: ComposerConfig) -> Composer {
    Composer::new(config).unwrap().with_observer(NoopObserver)
}

/// Records a label per event.
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl CompositionObserver for Recorder {
    fn on_event(&self, event: &CompositionEvent<'_>) {
        let label = match event {
            CompositionEvent::RunStarted { sections } => format!("started:{sections}"),
            CompositionEvent::SectionActivated { id, .. } => format!("activated:{id}"),
            CompositionEvent::SectionSkipped { id, stored, .. } => format!("skipped:{id}:{stored}"),
            CompositionEvent::TransformMissing { id, transform } => {
                format!("missing:{id}:{transform}")
            }
            CompositionEvent::RunFinished {
                activated, skipped, ..
            } => format!("finished:{activated}:{skipped}"),
        };
        self.0.lock().unwrap().push(label);
    }
}

// ── Reference section list ─────────────────────────────────────────

#[test]
fn empty_bag_keeps_null_and_default_sections_and_drops_omitted_ones() {
    let composer = quiet(ComposerConfig::default());
    let result = composer.compose(&LoadedData::new(json!({}))).unwrap();

    for section in default_sections() {
        let present = result.document.contains_key(&section.output_key);
        if section.fallback.action.omits_key() {
            assert!(!present, "{} should be omitted", section.id);
        } else {
            assert!(present, "{} should be present", section.id);
        }
    }
    assert_eq!(result.document["personality"], Value::Null);
    assert_eq!(result.document["memories"], json!({}));
    assert_eq!(result.document["summary"], "No identity or content spec configured.");
    assert_eq!(result.metadata.section_count, 16);
    assert_eq!(result.metadata.memory_count, 0);
}

#[test]
fn empty_array_source_stores_the_fallback_not_the_transform_output() {
    let composer = quiet(ComposerConfig::default());
    let loaded = subject().with_fragment("memories", json!([]));
    let result = composer.compose(&loaded).unwrap();

    assert_eq!(result.document["memories"], json!({}));
    assert!(result.metadata.skipped.iter().any(|s| s.id == "memories"));
    assert!(!result.metadata.activated.contains(&"memories".to_string()));
}

#[test]
fn realistic_run_fills_every_section() {
    let loaded = LoadedData::new(json!({
        "id": "c1",
        "name": "Ada Lovelace",
        "domainId": "d1",
        "domain": {"id": "d1", "name": "Spanish", "description": "Conversational Spanish."},
    }))
    .with_fragment("personality", json!({"traits": {"warmth": 0.9, "pace": 0.2}}))
    .with_fragment(
        "memories",
        json!([
            {"key": "pet", "value": "a cat called Bit", "category": "personal", "confidence": 0.9},
            {"key": "Pet", "value": "a cat", "category": "personal", "confidence": 0.4},
            {"key": "job", "value": "engineer", "category": "work"},
        ]),
    )
    .with_fragment(
        "behaviorTargets",
        json!([{"parameterId": "warmth", "name": "Warmth", "value": 0.8}]),
    )
    .with_fragment(
        "recentCalls",
        json!([{
            "startedAt": "2026-10-01T10:00:00Z",
            "durationSeconds": 600,
            "summary": "Ordered food.",
            "domainId": "d0",
        }]),
    )
    .with_fragment(
        "curriculum",
        json!({"modules": [
            {"name": "Greetings", "mastery": 0.9},
            {"name": "Food", "mastery": 0.3},
        ]}),
    )
    .with_fragment("goals", json!(["Order dinner in Spanish"]))
    .with_fragment("identitySpec", json!({"name": "Patient Tutor", "slug": "tutor"}))
    .with_fragment("contentSpec", json!({"name": "Spanish A1", "slug": "es-a1"}));

    let recorder = Recorder::default();
    let composer = Composer::new(ComposerConfig::default())
        .unwrap()
        .with_observer(recorder.clone());
    let result = composer.compose(&loaded).unwrap();
    let doc = &result.document;

    assert_eq!(doc["summary"], "Identity: Patient Tutor | Content: Spanish A1");
    assert_eq!(doc["version"], "compose/1");
    assert_eq!(doc["caller"]["firstName"], "Ada");
    assert!(doc["caller"].get("_record").is_none());
    assert_eq!(doc["memories"]["totalCount"], 2);
    assert!(doc["memories"].get("_all").is_none());
    assert_eq!(doc["callHistory"]["totalCalls"], 1);
    assert_eq!(doc["callHistory"]["totalMinutes"], 10);
    assert_eq!(doc["domain"]["name"], "Spanish");
    assert_eq!(doc["identity"]["name"], "Patient Tutor");
    assert_eq!(doc["firstCall"], Value::Null);
    assert!(doc.contains_key("domainWelcome"), "first call in d1");
    assert!(doc.contains_key("voiceGuidance"));
    assert_eq!(doc["sessionPlan"]["lastCallSummary"], "Ordered food.");
    let headline = doc["quickStart"]["headline"].as_str().unwrap();
    assert!(headline.starts_with("Call with Ada Lovelace about Spanish."));

    assert_eq!(result.metadata.memory_count, 3);
    assert!(result.metadata.skipped.iter().any(|s| s.id == "first_call"));

    let events = recorder.events();
    assert_eq!(events.first().map(String::as_str), Some("started:16"));
    assert!(events.last().unwrap().starts_with("finished:"));

    let prompt = result.render_prompt();
    assert!(prompt.starts_with("Identity: Patient Tutor | Content: Spanish A1\n\n## "));
    assert!(prompt.contains("## Session plan"));
}

#[test]
fn grouping_id_alone_assigns_the_domain() {
    let loaded = LoadedData::new(json!({"id": "c1", "domainId": "d1"}));
    let result = quiet(ComposerConfig::default()).compose(&loaded).unwrap();
    let doc = &result.document;

    assert_eq!(doc["domain"], json!({"id": "d1", "name": null, "description": null}));
    assert!(doc["domainWelcome"]["message"].as_str().unwrap().starts_with("Welcome"));
    let skipped: Vec<&str> = result.metadata.skipped.iter().map(|s| s.id.as_str()).collect();
    assert!(!skipped.contains(&"domain"));
    assert!(!skipped.contains(&"domain_welcome"));
}

// ── Ordering ───────────────────────────────────────────────────────

#[test]
fn reference_list_resolves_to_a_topological_order() {
    let sections = default_sections();
    let order = resolve_order(&sections);
    let position = |id: &str| order.iter().position(|s| s.id == id).unwrap();
    for section in &sections {
        for dep in &section.depends_on {
            assert!(position(dep) < position(&section.id), "{dep} before {}", section.id);
        }
    }
}

#[test]
fn dangling_dependency_does_not_fail_a_run() {
    let config = ComposerConfig::default()
        .with_validate_on_load(false)
        .with_sections(vec![SectionDefinition::new("a", "a", "caller").depends_on(["ghost"])]);
    let result = quiet(config).compose(&subject()).unwrap();
    assert_eq!(result.metadata.activated, vec!["a"]);
}

#[test]
fn dangling_dependency_is_refused_at_load() {
    let config = ComposerConfig::default()
        .with_sections(vec![SectionDefinition::new("a", "a", "caller").depends_on(["ghost"])]);
    let err = Composer::new(config).unwrap_err();
    assert!(err.to_string().contains("ghost"), "{err}");
}

// ── Fallbacks ──────────────────────────────────────────────────────

#[test]
fn fallback_actions_control_key_presence() {
    let sections = parse_sections(
        r#"[
            {"id": "n", "outputKey": "n", "dataSource": "none", "activateWhen": {"condition": "dataExists"}},
            {"id": "e", "outputKey": "e", "dataSource": "none", "activateWhen": {"condition": "dataExists"},
             "fallback": {"action": "emptyObject"}},
            {"id": "d", "outputKey": "d", "dataSource": "none", "activateWhen": {"condition": "dataExists"},
             "fallback": {"action": "emptyObject", "value": {"items": []}}},
            {"id": "o", "outputKey": "o", "dataSource": "none", "activateWhen": {"condition": "dataExists"},
             "fallback": {"action": "omit"}},
            {"id": "s", "outputKey": "s", "dataSource": "none", "activateWhen": {"condition": "dataExists"},
             "fallback": {"action": "skip"}}
        ]"#,
        std::path::Path::new("inline.json"),
    )
    .unwrap();
    let result = quiet(ComposerConfig::default().with_sections(sections))
        .compose(&subject())
        .unwrap();

    assert_eq!(result.document.get("n"), Some(&Value::Null));
    assert_eq!(result.document.get("e"), Some(&json!({})));
    assert_eq!(result.document.get("d"), Some(&json!({"items": []})));
    assert!(!result.document.contains_key("o"));
    assert!(!result.document.contains_key("s"));
    assert_eq!(result.metadata.skipped.len(), 5);
}

// ── Unknown conditions and transforms ──────────────────────────────

fn custom_condition_sections() -> Vec<SectionDefinition> {
    vec![SectionDefinition::new("x", "x", "caller").when(ActivationCondition::Custom {
        tag: "isVip".into(),
    })]
}

#[test]
fn unknown_condition_fails_closed_by_default() {
    let result = quiet(ComposerConfig::default().with_sections(custom_condition_sections()))
        .compose(&subject())
        .unwrap();
    assert_eq!(result.document["x"], Value::Null);
    assert_eq!(
        result.metadata.skipped[0].reason,
        ActivationReason::Unrecognized {
            tag: "isVip".into(),
            activated: false
        }
    );
}

#[test]
fn unknown_condition_can_fail_open() {
    let config = ComposerConfig::default()
        .with_sections(custom_condition_sections())
        .with_unknown_condition(UnknownConditionPolicy::FailOpen);
    let result = quiet(config).compose(&subject()).unwrap();
    assert_eq!(result.document["x"]["name"], "Ada Lovelace");
    assert_eq!(result.metadata.activated, vec!["x"]);
}

fn shout(input: &Value, _: &ComposeContext<'_>, _: &SectionDefinition) -> Value {
    json!(input.as_str().unwrap_or_default().to_uppercase())
}

#[test]
fn missing_transform_passes_through_and_is_reported() {
    let sections = vec![
        SectionDefinition::new("greeting", "greeting", "subject.name").chain(["shout", "whisper"]),
    ];
    let config = ComposerConfig::default()
        .with_sections(sections)
        .with_validate_on_load(false);
    let recorder = Recorder::default();
    let composer = Composer::with_registry(config, TransformRegistry::empty().with("shout", shout))
        .unwrap()
        .with_observer(recorder.clone());

    let result = composer.compose(&subject()).unwrap();
    assert_eq!(result.document["greeting"], "ADA LOVELACE");
    assert!(recorder.events().contains(&"missing:greeting:whisper".to_string()));
}

#[test]
fn unknown_transform_is_only_a_warning() {
    let sections = vec![SectionDefinition::new("a", "a", "caller").transform("nope")];
    assert!(Composer::new(ComposerConfig::default().with_sections(sections)).is_ok());
}

// ── Context and assembly ───────────────────────────────────────────

fn read_previous(_: &Value, ctx: &ComposeContext<'_>, _: &SectionDefinition) -> Value {
    json!({"sawFirst": ctx.output("first").is_some(), "_debug": true})
}

#[test]
fn later_sections_read_earlier_outputs_and_private_fields_are_stripped() {
    let sections = vec![
        SectionDefinition::new("second", "second", "caller")
            .transform("read_previous")
            .depends_on(["first"]),
        SectionDefinition::new("first", "first", "caller"),
    ];
    let registry = TransformRegistry::builtin().with("read_previous", read_previous);
    let config = ComposerConfig::default().with_sections(sections.clone());
    let composer = Composer::with_registry(config, registry.clone())
        .unwrap()
        .with_observer(NoopObserver);
    let result = composer.compose(&subject()).unwrap();
    assert_eq!(result.document["second"], json!({"sawFirst": true}));

    let keep_private = ComposerConfig::default()
        .with_sections(sections)
        .with_private_prefix("");
    let result = Composer::with_registry(keep_private, registry)
        .unwrap()
        .with_observer(NoopObserver)
        .compose(&subject())
        .unwrap();
    assert_eq!(result.document["second"]["_debug"], true);
}

#[test]
fn missing_subject_aborts_the_run() {
    let composer = quiet(ComposerConfig::default());
    let loaded = LoadedData::default().with_fragment("memories", json!([1]));
    let err = composer.compose(&loaded).unwrap_err();
    assert!(matches!(err, ComposeError::MissingSubject { .. }));
    assert!(err.to_string().contains("caller"));
}

#[test]
fn whole_context_sees_fragments_subject_and_outputs() {
    fn keys_of(input: &Value, _: &ComposeContext<'_>, _: &SectionDefinition) -> Value {
        let mut keys: Vec<&str> = input
            .as_object()
            .map(|o| o.keys().map(String::as_str).collect())
            .unwrap_or_default();
        keys.sort_unstable();
        json!(keys)
    }
    let sections = vec![
        SectionDefinition::new("a", "a", "caller"),
        SectionDefinition::new("all", "all", "_all").transform("keys_of"),
    ];
    let registry = TransformRegistry::empty().with("keys_of", keys_of);
    let config = ComposerConfig::default().with_sections(sections);
    let composer = Composer::with_registry(config, registry)
        .unwrap()
        .with_observer(NoopObserver);
    let loaded = subject().with_fragment("goals", json!(["x"]));
    let result = composer.compose(&loaded).unwrap();
    assert_eq!(result.document["all"], json!(["a", "caller", "goals"]));
}

// ── Templates ──────────────────────────────────────────────────────

#[test]
fn template_examples() {
    assert_eq!(template::compile("{{value}}", &json!({"value": "0.42"})), "0.42");
    assert_eq!(template::compile("{{#if high}}X{{/if}}", &json!({"high": false})), "");
    assert_eq!(template::compile("{{#if high}}X{{/if}}", &json!({"high": true})), "X");
    assert_eq!(
        template::compile(
            "{{#each items}}{{this.name}},{{/each}}",
            &json!({"items": [{"name": "a"}, {"name": "b"}]})
        ),
        "a,\nb,"
    );
}

#[test]
fn compile_is_deterministic() {
    let tpl =
        "{{#caller}}Hi {{name}}{{/caller}} {{#each tags}}[{{@index}}:{{this}}]{{/each}} {{missing}}";
    let data = json!({"caller": {"name": "Ada"}, "tags": ["x", "y"]});
    let first = template::compile(tpl, &data);
    for _ in 0..10 {
        assert_eq!(template::compile(tpl, &data), first);
    }
}
