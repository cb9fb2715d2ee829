//! Agent runner module
//!
//! Sequences one agent run: wait for the agent's browser, attach to it,
//! connect the wallet, snapshot the market, ask the oracle and swap.
//! Every stage fails fast; an error ends the run.

use serde::Serialize;
use tracing::{debug, error, info, info_span, Instrument};

use crate::browser::launch::BrowserLauncher;
use crate::browser::{BrowsingContext, CdpBrowser, CdpContext, PageHandle, ReadinessProbe};
use crate::config::{AgentProfile, Config, ProfileRegistry, RuntimeEnv};
use crate::journal::RunJournal;
use crate::market::{MarketApi, MarketData, MarketSnapshot, SnapshotBuilder};
use crate::oracle::{self, build_brief, DecisionOracle, OpenAiOracle, TradeDecision};
use crate::swap::{SwapExecutor, SwapReport};
use crate::tokens::TickerBook;
use crate::wallet::Handshake;
use crate::Result;

/// Result of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub account: String,
    pub decision: TradeDecision,
    /// `None` for dry runs
    pub swap: Option<SwapReport>,
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Connect,
    Open,
    Handshake,
    Snapshot,
    Decision,
    Swap,
    Teardown,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Connect => "connect",
            Stage::Open => "open",
            Stage::Handshake => "handshake",
            Stage::Snapshot => "snapshot",
            Stage::Decision => "decision",
            Stage::Swap => "swap",
            Stage::Teardown => "teardown",
        }
    }
}

/// Agent runner that manages one trading run per invocation
pub struct AgentRunner {
    config: Config,
    profiles: ProfileRegistry,
    tickers: TickerBook,
    env: RuntimeEnv,
    launch: bool,
    dry_run: bool,
}

impl AgentRunner {
    /// Create a new agent runner
    pub fn new(
        config: Config,
        profiles: ProfileRegistry,
        tickers: TickerBook,
        env: RuntimeEnv,
    ) -> Self {
        Self {
            config,
            profiles,
            tickers,
            env,
            launch: false,
            dry_run: false,
        }
    }

    /// Start the agent's browser before connecting
    pub fn with_launch(mut self, launch: bool) -> Self {
        self.launch = launch;
        self
    }

    /// Stop after the decision instead of swapping
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run the agent `agent_id` against its own browser
    pub async fn run(&self, agent_id: &str) -> Result<RunOutcome> {
        // Unknown agents fail before any browser work
        let profile = self.profiles.get(agent_id)?;
        self.config.validate()?;
        let span = info_span!("agent", id = %profile.id);

        async {
            info!(
                port = profile.port,
                profile = %profile.profile,
                dry_run = self.dry_run,
                "Starting agent run"
            );
            let journal =
                RunJournal::open(self.config.journal_path.as_deref(), &profile.id);

            let context = match self.attach(profile).await {
                Ok(context) => context,
                Err(e) => {
                    error!(stage = Stage::Connect.as_str(), error = %e, "Run failed");
                    journal.failure(Stage::Connect.as_str(), &e).await;
                    return Err(e);
                }
            };

            let market = MarketApi::from_env(&self.env);
            let oracle =
                OpenAiOracle::new(&self.config.oracle, self.env.oracle_api_key.clone());
            self.run_session(&context, &market, &oracle, profile, &journal)
                .await
        }
        .instrument(span)
        .await
    }

    /// Wait for the agent's browser and take its browsing context
    async fn attach(&self, profile: &AgentProfile) -> Result<CdpContext> {
        if self.launch {
            BrowserLauncher::from_current_dir(&self.config.chrome)?.launch(profile)?;
        }

        ReadinessProbe::for_port(&self.config, profile.port)?
            .wait_until_ready()
            .await?;

        let endpoint = self.config.control_endpoint(profile.port)?;
        let browser = CdpBrowser::connect(&endpoint).await?;
        browser.default_context().await
    }

    /// Drive one session in an attached context.
    ///
    /// The context is closed only when the run succeeds; a failed run leaves
    /// its pages and popups as they were.
    pub async fn run_session<C, M, O>(
        &self,
        context: &C,
        market: &M,
        oracle: &O,
        profile: &AgentProfile,
        journal: &RunJournal,
    ) -> Result<RunOutcome>
    where
        C: BrowsingContext,
        M: MarketData + ?Sized,
        O: DecisionOracle + ?Sized,
    {
        let mut stage = Stage::Open;
        let outcome = self
            .stages(context, market, oracle, profile, journal, &mut stage)
            .await;

        match &outcome {
            Ok(outcome) => {
                info!(
                    account = %outcome.account,
                    swapped = outcome.swap.is_some(),
                    "Run complete"
                );
            }
            Err(e) => {
                error!(stage = stage.as_str(), error = %e, "Run failed");
                journal.failure(stage.as_str(), e).await;
            }
        }
        outcome
    }

    async fn stages<C, M, O>(
        &self,
        context: &C,
        market: &M,
        oracle: &O,
        profile: &AgentProfile,
        journal: &RunJournal,
        stage: &mut Stage,
    ) -> Result<RunOutcome>
    where
        C: BrowsingContext,
        M: MarketData + ?Sized,
        O: DecisionOracle + ?Sized,
    {
        let config = &self.config;

        *stage = Stage::Open;
        let page = context.new_page().await?;
        info!(url = %config.dapp_url, "Opening dApp");
        page.goto(&config.dapp_url).await?;

        *stage = Stage::Handshake;
        let handshake =
            Handshake::new(&config.selectors, &config.timings, &self.env.wallet_password);
        let account = handshake.connect(context, &page).await?;

        *stage = Stage::Snapshot;
        let snapshot = SnapshotBuilder::new(market, &self.tickers, config.default_decimals)
            .build(&page, &account)
            .await?;
        self.log_snapshot(&snapshot);
        journal.record(Stage::Snapshot.as_str(), &snapshot).await;

        *stage = Stage::Decision;
        let brief = build_brief(profile, &snapshot, &self.env.base_asset, &self.tickers);
        debug!(%brief, "Market brief");
        let decision = oracle::decide(oracle, &brief, &self.tickers).await?;
        journal.record(Stage::Decision.as_str(), &decision).await;

        let swap = if self.dry_run {
            info!("Dry run, not swapping");
            None
        } else {
            *stage = Stage::Swap;
            let executor =
                SwapExecutor::new(&config.selectors, &config.timings, config.approval);
            let report = executor.execute(context, &page, &decision).await?;
            journal.record(Stage::Swap.as_str(), report).await;
            Some(report)
        };

        *stage = Stage::Teardown;
        context.close().await?;

        Ok(RunOutcome {
            account,
            decision,
            swap,
        })
    }

    fn log_snapshot(&self, snapshot: &MarketSnapshot) {
        for token in &snapshot.tokens {
            info!(
                token = %self.tickers.ticker_for(&token.address),
                balance = %token.balance.as_ref().map(|b| b.to_string()).unwrap_or_default(),
                price = ?token.price,
                "Market"
            );
        }
    }
}
