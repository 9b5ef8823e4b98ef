//! End-to-end protocol tests with mock providers and a scripted synthesizer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use template_agentic::engine::{FOOTER_PROVIDER, PARAMETER_CATALOG, TEMPLATE_CORPUS};
use template_agentic::{
    ContentSynthesizer, FooterFragment, FooterMarker, FooterProvider, GenerationError,
    GenerationRequest, ParameterCatalogProvider, ParameterDescriptor, ProviderError,
    StructuralPolicy, SynthesisError, SynthesisInput, TemplateCorpusProvider, TemplateDescriptor,
    TemplateEngine, Violation,
};

const FOOTER: &str = "FOOTER";

#[derive(Default)]
struct Counters {
    catalog: Arc<AtomicUsize>,
    corpus: Arc<AtomicUsize>,
    footer: Arc<AtomicUsize>,
    synthesizer: Arc<AtomicUsize>,
}

struct MockCatalog {
    parameters: Vec<ParameterDescriptor>,
    calls: Arc<AtomicUsize>,
    fail: bool,
}

#[async_trait]
impl ParameterCatalogProvider for MockCatalog {
    async fn list(&self) -> Result<Vec<ParameterDescriptor>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::new("catalog database unreachable"));
        }
        Ok(self.parameters.clone())
    }
}

struct MockCorpus {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl TemplateCorpusProvider for MockCorpus {
    async fn list_all(&self) -> Result<Vec<TemplateDescriptor>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![TemplateDescriptor {
            name: "payment_reminder".into(),
            description: "payment reminder".into(),
            body: "<h2>Payment Due</h2><p>Sincerely,</p>".into(),
        }])
    }
}

struct MockFooter {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl FooterProvider for MockFooter {
    async fn get(&self) -> Result<FooterFragment, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FooterFragment::new(FOOTER))
    }
}

/// Returns a fixed body, no matter the input.
struct ScriptedSynthesizer {
    body: String,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ContentSynthesizer for ScriptedSynthesizer {
    async fn run(&self, _input: SynthesisInput<'_>) -> Result<String, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.clone())
    }
}

/// Signals that synthesis started, then never completes.
struct HangingSynthesizer {
    started: Arc<tokio::sync::Notify>,
}

#[async_trait]
impl ContentSynthesizer for HangingSynthesizer {
    async fn run(&self, _input: SynthesisInput<'_>) -> Result<String, SynthesisError> {
        self.started.notify_one();
        std::future::pending().await
    }
}

fn whitelist_pairs() -> Vec<ParameterDescriptor> {
    vec![
        ParameterDescriptor::new("customer_id", "The customer identifier"),
        ParameterDescriptor::new("bank_name", "The bank display name"),
    ]
}

fn test_policy() -> StructuralPolicy {
    StructuralPolicy {
        footer_marker: FooterMarker::KnownBody(FOOTER.into()),
        ..StructuralPolicy::default()
    }
}

fn build_engine(
    synthesizer: Arc<dyn ContentSynthesizer>,
    counters: Counters,
    catalog_fails: bool,
) -> (Arc<TemplateEngine>, Counters) {
    let engine = TemplateEngine::new(
        Arc::new(MockCatalog {
            parameters: whitelist_pairs(),
            calls: Arc::clone(&counters.catalog),
            fail: catalog_fails,
        }),
        Arc::new(MockCorpus {
            calls: Arc::clone(&counters.corpus),
        }),
        Arc::new(MockFooter {
            calls: Arc::clone(&counters.footer),
        }),
        synthesizer,
    )
    .with_policy(test_policy());
    (Arc::new(engine), counters)
}

fn build_scripted_engine(body: &str, catalog_fails: bool) -> (Arc<TemplateEngine>, Counters) {
    let counters = Counters::default();
    let synthesizer = Arc::new(ScriptedSynthesizer {
        body: body.into(),
        calls: Arc::clone(&counters.synthesizer),
    });
    build_engine(synthesizer, counters, catalog_fails)
}

fn build_hanging_engine(
    started: Arc<tokio::sync::Notify>,
) -> (Arc<TemplateEngine>, Counters) {
    build_engine(
        Arc::new(HangingSynthesizer { started }),
        Counters::default(),
        false,
    )
}

const COMPLIANT_BODY: &str = "<h2>Welcome</h2>\
    <p>Customer: [[customer_id]]</p>\
    <p>We are pleased to welcome you to our bank.</p>\
    <p>Sincerely,</p><p>Your [[bank_name]] Customer Care Team</p>";

#[tokio::test]
async fn scenario_a_new_request_appends_footer_and_passes() {
    let (engine, counters) = build_scripted_engine(COMPLIANT_BODY, false);
    let doc = engine
        .generate(GenerationRequest::new("Generate simple greeting template"))
        .await
        .unwrap();

    assert!(doc.body.trim_start().starts_with("<h2"));
    assert!(doc.body.contains("[[customer_id]]"));
    assert!(doc.body.trim_end().ends_with(FOOTER));
    assert!(doc.footer_appended);
    assert_eq!(doc.body.matches(FOOTER).count(), 1);
    assert_eq!(counters.catalog.load(Ordering::SeqCst), 1);
    assert_eq!(counters.corpus.load(Ordering::SeqCst), 1);
    assert_eq!(counters.footer.load(Ordering::SeqCst), 1);
    assert_eq!(counters.synthesizer.load(Ordering::SeqCst), 1);
    assert_eq!(engine.sessions().sessions_closed(), 1);
    assert_eq!(engine.sessions().active_sessions(), 0);
}

#[tokio::test]
async fn scenario_b_revision_with_footer_skips_fetch_and_keeps_one_footer() {
    let existing = format!("{COMPLIANT_BODY}\n{FOOTER}");
    let (engine, counters) = build_scripted_engine(&existing, false);
    let doc = engine
        .generate(GenerationRequest::revision(
            "Polish the wording",
            existing.clone(),
        ))
        .await
        .unwrap();

    assert_eq!(counters.footer.load(Ordering::SeqCst), 0);
    assert!(!doc.footer_appended);
    assert_eq!(doc.body.matches(FOOTER).count(), 1);
    assert!(doc.body.trim_end().ends_with(FOOTER));
}

#[tokio::test]
async fn revision_without_footer_fetches_exactly_once() {
    let (engine, counters) = build_scripted_engine(COMPLIANT_BODY, false);
    let doc = engine
        .generate(GenerationRequest::revision(
            "Polish the wording",
            COMPLIANT_BODY,
        ))
        .await
        .unwrap();

    assert_eq!(counters.footer.load(Ordering::SeqCst), 1);
    assert!(doc.footer_appended);
    assert!(doc.body.trim_end().ends_with(FOOTER));
}

#[tokio::test]
async fn scenario_c_unauthorized_placeholder_fails_with_violation() {
    let body = format!(
        "<h2>Welcome</h2><p>[[customer_id]]</p><p>[[unknown_field]]</p>\
         <p>Sincerely,</p><p>Your [[bank_name]] Customer Care Team</p>\n{FOOTER}"
    );
    let (engine, _counters) = build_scripted_engine(&body, false);
    let err = engine
        .generate(GenerationRequest::new("Generate simple greeting template"))
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::Validation(_)));
    assert!(err
        .violations()
        .contains(&Violation::UnauthorizedPlaceholder("unknown_field".into())));
    assert_eq!(engine.sessions().sessions_closed(), 1);
}

#[tokio::test]
async fn scenario_d_catalog_failure_stops_before_footer_and_synthesis() {
    let (engine, counters) = build_scripted_engine(COMPLIANT_BODY, true);
    let err = engine
        .generate(GenerationRequest::new("Generate simple greeting template"))
        .await
        .unwrap_err();

    match err {
        GenerationError::ProviderUnavailable { provider, .. } => {
            assert_eq!(provider, PARAMETER_CATALOG);
        }
        other => panic!("expected ProviderUnavailable, got {other:?}"),
    }
    assert_eq!(counters.footer.load(Ordering::SeqCst), 0);
    assert_eq!(counters.synthesizer.load(Ordering::SeqCst), 0);
    assert_eq!(engine.sessions().sessions_closed(), 1);
    assert_eq!(engine.sessions().active_sessions(), 0);
}

#[tokio::test]
async fn structural_violation_withholds_document() {
    // No heading, no closing block.
    let (engine, _counters) = build_scripted_engine("<p>[[customer_id]]</p>", false);
    let err = engine
        .generate(GenerationRequest::new("Generate simple greeting template"))
        .await
        .unwrap_err();

    let violations = err.violations();
    assert!(violations.contains(&Violation::MissingTitle));
    assert!(violations.contains(&Violation::MissingClosing));
}

#[tokio::test]
async fn deadline_expiry_cancels_synthesis_and_tears_down() {
    let started = Arc::new(tokio::sync::Notify::new());
    let (engine, counters) = build_hanging_engine(Arc::clone(&started));
    let err = engine
        .generate_with_deadline(
            GenerationRequest::new("Generate simple greeting template"),
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::SynthesisCancelled));
    // Prereqs and footer were fetched before the hang.
    assert_eq!(counters.catalog.load(Ordering::SeqCst), 1);
    assert_eq!(counters.footer.load(Ordering::SeqCst), 1);
    assert_eq!(engine.sessions().sessions_closed(), 1);
    assert_eq!(engine.sessions().active_sessions(), 0);
}

#[tokio::test]
async fn aborted_attempt_still_tears_down_exactly_once() {
    let started = Arc::new(tokio::sync::Notify::new());
    let (engine, _counters) = build_hanging_engine(Arc::clone(&started));

    let task_engine = Arc::clone(&engine);
    let handle = tokio::spawn(async move {
        task_engine
            .generate(GenerationRequest::new("Generate simple greeting template"))
            .await
    });

    started.notified().await;
    handle.abort();
    let join = handle.await;
    assert!(join.is_err(), "task should have been aborted");

    assert_eq!(engine.sessions().sessions_opened(), 1);
    assert_eq!(engine.sessions().sessions_closed(), 1);
    assert_eq!(engine.sessions().active_sessions(), 0);
}

#[tokio::test]
async fn call_log_records_every_provider_outcome() {
    // The call log itself is session-internal; the observable contract here
    // is that each prerequisite provider ran exactly once per attempt even
    // across consecutive sessions.
    let (engine, counters) = build_scripted_engine(COMPLIANT_BODY, false);
    for _ in 0..3 {
        engine
            .generate(GenerationRequest::new("Generate simple greeting template"))
            .await
            .unwrap();
    }
    assert_eq!(counters.catalog.load(Ordering::SeqCst), 3);
    assert_eq!(counters.corpus.load(Ordering::SeqCst), 3);
    assert_eq!(counters.footer.load(Ordering::SeqCst), 3);
    assert_eq!(engine.sessions().sessions_closed(), 3);
}

#[tokio::test]
async fn provider_name_constants_are_stable() {
    // Error reports and call logs key on these names.
    assert_eq!(PARAMETER_CATALOG, "parameter_catalog");
    assert_eq!(TEMPLATE_CORPUS, "template_corpus");
    assert_eq!(FOOTER_PROVIDER, "footer");
}
