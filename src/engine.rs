//! Template Generation Protocol Engine
//!
//! Request-scoped orchestrator for one generation attempt. Sequences the
//! provider calls, makes the footer decision idempotently, invokes the
//! synthesizer exactly once, runs both validators, and assembles a typed
//! outcome. No retries happen here; retrying is a caller decision expressed
//! by starting a new session.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::GenerationError;
use crate::model::{
    FinalizedDocument, FooterFragment, GenerationRequest, TemplateDescriptor, WhitelistSnapshot,
};
use crate::placeholders;
use crate::providers::{FooterProvider, ParameterCatalogProvider, TemplateCorpusProvider};
use crate::session::{CallOutcome, GenerationSession, SessionManager, SessionState};
use crate::structure::{self, StructuralPolicy};
use crate::synthesizer::{ContentSynthesizer, SynthesisInput};

/// Provider names as they appear in session call logs and error reports.
pub const PARAMETER_CATALOG: &str = "parameter_catalog";
pub const TEMPLATE_CORPUS: &str = "template_corpus";
pub const FOOTER_PROVIDER: &str = "footer";
pub const SYNTHESIZER: &str = "synthesizer";

/// The protocol engine. One instance serves many concurrent sessions; all
/// per-attempt state lives in the session.
pub struct TemplateEngine {
    catalog: Arc<dyn ParameterCatalogProvider>,
    corpus: Arc<dyn TemplateCorpusProvider>,
    footer: Arc<dyn FooterProvider>,
    synthesizer: Arc<dyn ContentSynthesizer>,
    sessions: SessionManager,
    policy: StructuralPolicy,
}

impl TemplateEngine {
    pub fn new(
        catalog: Arc<dyn ParameterCatalogProvider>,
        corpus: Arc<dyn TemplateCorpusProvider>,
        footer: Arc<dyn FooterProvider>,
        synthesizer: Arc<dyn ContentSynthesizer>,
    ) -> Self {
        Self {
            catalog,
            corpus,
            footer,
            synthesizer,
            sessions: SessionManager::new(),
            policy: StructuralPolicy::default(),
        }
    }

    /// Override the shape contract (header fields, closing marker, footer
    /// detection rule).
    pub fn with_policy(mut self, policy: StructuralPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Lifecycle gauges for the sessions this engine has run.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Run one generation attempt with no deadline.
    pub async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<FinalizedDocument, GenerationError> {
        self.run(request, None).await
    }

    /// Run one generation attempt, aborting synthesis when the deadline
    /// elapses. Teardown still runs on the timeout path.
    pub async fn generate_with_deadline(
        &self,
        request: GenerationRequest,
        deadline: Duration,
    ) -> Result<FinalizedDocument, GenerationError> {
        self.run(request, Some(deadline)).await
    }

    async fn run(
        &self,
        request: GenerationRequest,
        deadline: Option<Duration>,
    ) -> Result<FinalizedDocument, GenerationError> {
        // Session teardown is guaranteed even if this future is dropped:
        // the session closes itself on Drop.
        let mut session = self.sessions.open();
        let result = self.run_protocol(&mut session, &request, deadline).await;
        match &result {
            Ok(doc) => {
                info!(session_id = %session.id(), footer_appended = doc.footer_appended,
                    "template generated");
            }
            Err(err) => {
                session.fail();
                warn!(session_id = %session.id(), error = %err, "generation attempt failed");
            }
        }
        session.close();
        result
    }

    /// The state machine proper: INIT → PREREQS_FETCHED → FOOTER_DECIDED →
    /// SYNTHESIZED → VALIDATED → DONE, with FAILED absorbing any error.
    async fn run_protocol(
        &self,
        session: &mut GenerationSession,
        request: &GenerationRequest,
        deadline: Option<Duration>,
    ) -> Result<FinalizedDocument, GenerationError> {
        // INIT → PREREQS_FETCHED. Catalog and corpus may run concurrently,
        // but each exactly once, and both before the footer decision.
        let (catalog_result, corpus_result) =
            tokio::join!(self.catalog.list(), self.corpus.list_all());

        session.record_call(PARAMETER_CATALOG, outcome_of(&catalog_result))?;
        session.record_call(TEMPLATE_CORPUS, outcome_of(&corpus_result))?;

        let whitelist = WhitelistSnapshot::new(
            catalog_result.map_err(|e| GenerationError::provider(PARAMETER_CATALOG, e))?,
        );
        let corpus: Vec<TemplateDescriptor> =
            corpus_result.map_err(|e| GenerationError::provider(TEMPLATE_CORPUS, e))?;
        session.set_whitelist(whitelist.clone());
        session.advance(SessionState::PrereqsFetched)?;

        // PREREQS_FETCHED → FOOTER_DECIDED. At most one fetch per session.
        let footer = self.decide_footer(session, request).await?;
        session.advance(SessionState::FooterDecided)?;

        // FOOTER_DECIDED → SYNTHESIZED. Invoked exactly once; the sole
        // suspension point subject to the caller's deadline.
        let input = SynthesisInput {
            request,
            whitelist: &whitelist,
            corpus: &corpus,
            footer: footer.as_ref(),
        };
        let synthesis = match deadline {
            Some(limit) => match tokio::time::timeout(limit, self.synthesizer.run(input)).await {
                Ok(result) => result,
                Err(_) => {
                    session.record_call(SYNTHESIZER, CallOutcome::Err("cancelled".into()))?;
                    return Err(GenerationError::SynthesisCancelled);
                }
            },
            None => self.synthesizer.run(input).await,
        };
        session.record_call(SYNTHESIZER, outcome_of(&synthesis))?;
        let mut body = synthesis?;
        session.advance(SessionState::Synthesized)?;

        // Deterministic post-processing: when a footer is required and the
        // synthesizer left it out entirely, the engine appends it verbatim.
        // An edited (non-byte-exact) footer is left in place for the
        // validator to reject.
        let mut footer_appended = false;
        if let Some(fragment) = &footer {
            let exact = fragment.body.trim_end();
            if !exact.is_empty()
                && !body.contains(exact)
                && !self.policy.footer_marker.is_present(&body)
            {
                session.mark_footer_appended()?;
                body = format!("{}\n{}", body.trim_end(), fragment.body);
                footer_appended = true;
            }
        }

        // SYNTHESIZED → VALIDATED. Both validators run; violations accumulate.
        let outcome = placeholders::validate(&body, &whitelist).merge(structure::validate(
            &body,
            !request.is_revision(),
            &whitelist,
            footer.as_ref(),
            &self.policy,
        ));
        session.advance(SessionState::Validated)?;

        // VALIDATED → DONE, only when both validators passed.
        if !outcome.passed {
            return Err(GenerationError::Validation(outcome.violations));
        }
        session.advance(SessionState::Done)?;
        Ok(FinalizedDocument {
            body,
            session_id: session.id(),
            footer_appended,
        })
    }

    /// Classify the attempt and fetch the footer when required: always for a
    /// new attempt, and for a revision only when the existing content does
    /// not already carry the footer marker.
    async fn decide_footer(
        &self,
        session: &mut GenerationSession,
        request: &GenerationRequest,
    ) -> Result<Option<FooterFragment>, GenerationError> {
        let already_present = request.is_revision()
            && request
                .existing_content
                .as_deref()
                .map(|content| self.policy.footer_marker.is_present(content))
                .unwrap_or(false);
        if already_present {
            info!(session_id = %session.id(), "footer already present; skipping fetch");
            return Ok(None);
        }

        let fetched = self.footer.get().await;
        session.record_call(FOOTER_PROVIDER, outcome_of(&fetched))?;
        let fragment = fetched.map_err(|e| GenerationError::provider(FOOTER_PROVIDER, e))?;
        Ok(Some(fragment))
    }
}

fn outcome_of<T, E: std::fmt::Display>(result: &Result<T, E>) -> CallOutcome {
    match result {
        Ok(_) => CallOutcome::Ok,
        Err(e) => CallOutcome::Err(e.to_string()),
    }
}
