//! Scripted host sessions replayed against a [`VirtualDocument`].

use anyhow::{bail, Context as AnyhowContext, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use topic_helper_annotator::{
    AnnotationSession, AnnotatorConfig, ManualClock, ReplayDriver, SessionStats,
};
use topic_helper_dom::{HostDocument, NodeSpec, VirtualDocument};
use topic_helper_lookup::{LookupClient, Transport};
use topic_helper_protocol::{BadgeReport, HostMessage, StateResponse};

/// Upper bound on the virtual time spent waiting for the page to go quiet
/// after the last step.
const SETTLE_LIMIT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scenario {
    /// Initial location.
    pub url: String,
    /// Start with the document still loading; a `ready` step finishes it.
    #[serde(default)]
    pub loading: bool,
    /// Stored toggle state answered at startup; absent means no answer.
    #[serde(default)]
    pub stored_state: Option<bool>,
    #[serde(default)]
    pub body: Vec<NodeSpec>,
    /// Lookup URL to JSON payload; unknown URLs answer 404.
    #[serde(default)]
    pub lookup_fixtures: HashMap<String, Value>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NavigateMode {
    #[default]
    Push,
    Replace,
    /// Location changes without a history notification.
    Silent,
}

/// One host action. Element targets are CSS selectors; the first match is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Navigate {
        url: String,
        #[serde(default)]
        mode: NavigateMode,
    },
    Back,
    Forward,
    Append {
        parent: String,
        node: NodeSpec,
    },
    Replace {
        target: String,
        node: NodeSpec,
    },
    Remove {
        target: String,
    },
    SetText {
        target: String,
        text: String,
    },
    SetHidden {
        target: String,
        #[serde(default = "default_true")]
        hidden: bool,
    },
    Toggle {
        enabled: bool,
    },
    Ready,
    WaitMs {
        ms: u64,
    },
}

fn default_true() -> bool {
    true
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::Back => "back",
            Self::Forward => "forward",
            Self::Append { .. } => "append",
            Self::Replace { .. } => "replace",
            Self::Remove { .. } => "remove",
            Self::SetText { .. } => "set_text",
            Self::SetHidden { .. } => "set_hidden",
            Self::Toggle { .. } => "toggle",
            Self::Ready => "ready",
            Self::WaitMs { .. } => "wait_ms",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayOutput {
    pub report: BadgeReport,
    pub stats: SessionStats,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid scenario {}", path.display()))
    }

    fn build_document(&self) -> Result<VirtualDocument> {
        let mut doc = if self.loading {
            VirtualDocument::loading(self.url.as_str())
        } else {
            VirtualDocument::new(self.url.as_str())
        };
        let body = doc.body();
        for spec in &self.body {
            doc.append_spec(body, spec)?;
        }
        Ok(doc)
    }
}

/// Runs `scenario` to quiescence on a manual clock and reports the badges.
pub async fn run_scenario(
    scenario: &Scenario,
    transport: Arc<dyn Transport>,
    config: AnnotatorConfig,
) -> Result<ReplayOutput> {
    let doc = scenario.build_document()?;
    let clock = ManualClock::new();
    let lookup = LookupClient::new(transport, config.endpoints.clone());
    let session = AnnotationSession::new(doc, config, lookup, Arc::new(clock.clone()))?;
    let mut driver = ReplayDriver::new(session, clock);

    driver
        .session_mut()
        .start(scenario.stored_state.map(|enabled| StateResponse { enabled }));
    driver.step().await;

    for (index, step) in scenario.steps.iter().enumerate() {
        apply_step(&mut driver, step)
            .await
            .with_context(|| format!("step {} ({}) failed", index + 1, step.name()))?;
    }
    driver.settle(SETTLE_LIMIT).await;

    let session = driver.session();
    log::info!(
        "replay finished after {} passes with {} badges",
        session.stats().passes,
        session.store().multi().len() + usize::from(session.store().single().is_some())
    );
    Ok(ReplayOutput {
        report: session.snapshot(),
        stats: session.stats(),
    })
}

async fn apply_step(driver: &mut ReplayDriver<VirtualDocument>, step: &Step) -> Result<()> {
    match step {
        Step::Navigate { url, mode } => {
            let doc = driver.document_mut();
            match mode {
                NavigateMode::Push => doc.push_state(url.as_str()),
                NavigateMode::Replace => doc.replace_state(url.as_str()),
                NavigateMode::Silent => doc.set_location_silently(url.as_str()),
            }
        }
        Step::Back => {
            if !driver.document_mut().back() {
                bail!("no earlier history entry");
            }
        }
        Step::Forward => {
            if !driver.document_mut().forward() {
                bail!("no later history entry");
            }
        }
        Step::Append { parent, node } => {
            let doc = driver.document_mut();
            let parent = doc.select_first(parent)?;
            doc.append_spec(parent, node)?;
        }
        Step::Replace { target, node } => {
            let doc = driver.document_mut();
            let target = doc.select_first(target)?;
            doc.replace_with_spec(target, node)?;
        }
        Step::Remove { target } => {
            let doc = driver.document_mut();
            let target = doc.select_first(target)?;
            doc.remove(target);
        }
        Step::SetText { target, text } => {
            let doc = driver.document_mut();
            let target = doc.select_first(target)?;
            doc.set_text_content(target, text);
        }
        Step::SetHidden { target, hidden } => {
            let doc = driver.document_mut();
            let target = doc.select_first(target)?;
            doc.set_hidden(target, *hidden)?;
        }
        Step::Toggle { enabled } => driver
            .session_mut()
            .handle_message(&HostMessage::Toggle { enabled: *enabled }),
        Step::Ready => {
            driver.document_mut().finish_loading();
            driver.session_mut().document_ready();
        }
        Step::WaitMs { ms } => driver.advance(Duration::from_millis(*ms)).await,
    }
    driver.step().await;
    Ok(())
}
