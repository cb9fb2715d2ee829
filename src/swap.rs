//! Swap execution through the dApp's swap form
//!
//! The form re-renders while it validates, so every step waits for its
//! control to be actionable (or, for selects, for the option to be offered)
//! and the configured settle delays act as minimums in front of those waits. Nothing is rolled back: a failure part way leaves
//! the form and the wallet as they are.

use serde::Serialize;
use tracing::{debug, info};

use crate::browser::wait::{poll_until, settle};
use crate::browser::{BrowsingContext, PageHandle, PopupAwait, Selector};
use crate::config::{ApprovalPolicy, Timings, UiSelectors};
use crate::oracle::TradeDecision;
use crate::Result;

/// What a swap went through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SwapReport {
    /// Whether the token needed an approval first
    pub approval_required: bool,
    /// Approval popups confirmed
    pub approvals_confirmed: usize,
}

pub struct SwapExecutor<'a> {
    selectors: &'a UiSelectors,
    timings: &'a Timings,
    approval: ApprovalPolicy,
}

impl<'a> SwapExecutor<'a> {
    pub fn new(
        selectors: &'a UiSelectors,
        timings: &'a Timings,
        approval: ApprovalPolicy,
    ) -> Self {
        Self {
            selectors,
            timings,
            approval,
        }
    }

    /// Fill the form, approve if needed, swap, and confirm in the wallet
    pub async fn execute<C>(
        &self,
        context: &C,
        page: &C::Page,
        decision: &TradeDecision,
    ) -> Result<SwapReport>
    where
        C: BrowsingContext,
    {
        let selectors = self.selectors;
        info!(
            from = %decision.from,
            to = %decision.to,
            amount = %decision.amount,
            "Filling swap form"
        );

        self.select(page, &selectors.from_token, &decision.from).await?;
        self.select(page, &selectors.to_token, &decision.to).await?;
        page.wait_actionable(&selectors.amount_input, self.timings.selector_wait())
            .await?;
        page.fill(&selectors.amount_input, &decision.amount).await?;

        settle(self.timings.form_settle()).await;

        let approval_required = page.is_visible(&selectors.approve_button).await?;
        let approvals_confirmed = if approval_required {
            self.approve(context, page).await?
        } else {
            debug!("Token already approved");
            0
        };

        settle(self.timings.swap_settle()).await;
        page.wait_for(&selectors.swap_button, self.timings.selector_wait())
            .await?;

        info!("Swapping");
        let mut popups = PopupAwait::from_context(context, self.timings);
        // The button's enabled state flickers while the form re-renders
        let confirmation = popups
            .expect_after(page.dom_click(&selectors.swap_button), "swap confirmation")
            .await?;
        self.confirm(&confirmation).await?;
        info!("Swap confirmed");

        settle(self.timings.post_swap_settle()).await;

        Ok(SwapReport {
            approval_required,
            approvals_confirmed,
        })
    }

    async fn select<P: PageHandle>(
        &self,
        page: &P,
        selector: &Selector,
        value: &str,
    ) -> Result<()> {
        // Token lists are filled in after the select itself renders
        let what = format!("option {} in {}", value, selector);
        poll_until(self.timings.selector_wait(), &what, move || async move {
            Ok(page.has_option(selector, value).await?.then_some(()))
        })
        .await?;
        page.select_option(selector, value).await
    }

    /// Click the approve button and confirm the popups it produces
    async fn approve<C>(&self, context: &C, page: &C::Page) -> Result<usize>
    where
        C: BrowsingContext,
    {
        let approve = &self.selectors.approve_button;
        info!(policy = ?self.approval, "Approving token");
        page.wait_actionable(approve, self.timings.selector_wait())
            .await?;

        // One subscription for the whole chain of approval popups
        let mut popups = PopupAwait::from_context(context, self.timings);

        let confirmed = match self.approval {
            ApprovalPolicy::Fixed { popups: 0 } => {
                page.click(approve).await?;
                0
            }
            ApprovalPolicy::Fixed { popups: expected } => {
                let first = popups.expect_after(page.click(approve), "approval").await?;
                self.confirm(&first).await?;
                for _ in 1..expected {
                    let next = popups.expect("approval").await?;
                    self.confirm(&next).await?;
                }
                expected
            }
            ApprovalPolicy::Detect { max } => {
                let first = popups.expect_after(page.click(approve), "approval").await?;
                self.confirm(&first).await?;
                let mut confirmed = 1;
                while confirmed < max {
                    match popups.next().await? {
                        Some(next) => {
                            self.confirm(&next).await?;
                            confirmed += 1;
                        }
                        None => break,
                    }
                }
                confirmed
            }
        };

        info!(confirmed, "Token approved");
        Ok(confirmed)
    }

    async fn confirm<P: PageHandle>(&self, popup: &P) -> Result<()> {
        let confirm = &self.selectors.confirm_button;
        // Wallets keep Confirm disabled until the fee estimate is in
        popup.wait_actionable(confirm, self.timings.selector_wait())
            .await?;
        popup.click(confirm).await?;
        debug!(popup = %popup.label(), "Confirmed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeContext, FakePage};
    use crate::Error;
    use std::time::Duration;

    const CONFIRM: &str = "click button:has-text(\"Confirm\")";

    fn decision() -> TradeDecision {
        TradeDecision {
            from: "0xAAA".to_string(),
            to: "0xBBB".to_string(),
            amount: "5".to_string(),
            reason: "test".to_string(),
        }
    }

    fn wallet(context: &FakeContext, name: &str, selectors: &UiSelectors) -> FakePage {
        context.page(name).with(&selectors.confirm_button)
    }

    /// Swap form whose swap button opens a confirmation popup
    fn form(context: &FakeContext, selectors: &UiSelectors) -> FakePage {
        let confirmation = wallet(context, "confirmation", selectors);
        context
            .main()
            .with(&selectors.from_token)
            .with(&selectors.to_token)
            .with(&selectors.amount_input)
            .with_hidden(&selectors.swap_button)
            .spawns(&selectors.swap_button, vec![confirmation])
    }

    fn confirmations(context: &FakeContext, popup: &str) -> usize {
        context.count(&format!("{} {}", popup, CONFIRM))
    }

    #[tokio::test]
    async fn test_visible_approval_confirms_two_popups() {
        let selectors = UiSelectors::default();
        let timings = Timings::instant();
        let context = FakeContext::new();

        // The second approval popup opens once the first is confirmed
        let second = wallet(&context, "approval2", &selectors);
        let first = wallet(&context, "approval1", &selectors)
            .spawns(&selectors.confirm_button, vec![second]);
        let page = form(&context, &selectors)
            .with(&selectors.approve_button)
            .spawns(&selectors.approve_button, vec![first]);

        let report = SwapExecutor::new(&selectors, &timings, ApprovalPolicy::default())
            .execute(&context, &page, &decision())
            .await
            .unwrap();

        assert_eq!(
            report,
            SwapReport {
                approval_required: true,
                approvals_confirmed: 2,
            }
        );
        assert_eq!(confirmations(&context, "approval1"), 1);
        assert_eq!(confirmations(&context, "approval2"), 1);
        assert_eq!(confirmations(&context, "confirmation"), 1);

        let log = context.log();
        let at = |entry: &str| log.iter().position(|e| e == entry).unwrap();
        let approve = at("dapp click .approve-token-button");
        assert!(at("dapp select .from-swap-token select = 0xAAA") < approve);
        assert!(at("dapp select .to-swap-token select = 0xBBB") < approve);
        assert!(at("dapp fill .from-swap-amount input = 5") < approve);
        assert!(at(&format!("approval2 {}", CONFIRM)) < at("dapp dom_click .swap-token-button"));
    }

    #[tokio::test]
    async fn test_hidden_approval_is_skipped() {
        let selectors = UiSelectors::default();
        let timings = Timings::instant();
        let context = FakeContext::new();
        let page = form(&context, &selectors).with_hidden(&selectors.approve_button);

        let report = SwapExecutor::new(&selectors, &timings, ApprovalPolicy::default())
            .execute(&context, &page, &decision())
            .await
            .unwrap();

        assert_eq!(report.approvals_confirmed, 0);
        assert!(!report.approval_required);
        assert_eq!(context.count("dapp click .approve-token-button"), 0);
        assert_eq!(confirmations(&context, "confirmation"), 1);
        assert_eq!(
            context.log().iter().filter(|e| e.ends_with(CONFIRM)).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_missing_second_approval_aborts_before_swap() {
        let selectors = UiSelectors::default();
        let timings = Timings::instant();
        let context = FakeContext::new();

        let only = wallet(&context, "approval1", &selectors);
        let page = form(&context, &selectors)
            .with(&selectors.approve_button)
            .spawns(&selectors.approve_button, vec![only]);

        let err = SwapExecutor::new(&selectors, &timings, ApprovalPolicy::Fixed { popups: 2 })
            .execute(&context, &page, &decision())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(context.count("dapp dom_click .swap-token-button"), 0);
    }

    #[tokio::test]
    async fn test_detect_policy_confirms_what_arrives() {
        let selectors = UiSelectors::default();
        let timings = Timings::instant();
        let context = FakeContext::new();

        let only = wallet(&context, "approval1", &selectors);
        let page = form(&context, &selectors)
            .with(&selectors.approve_button)
            .spawns(&selectors.approve_button, vec![only]);

        let report = SwapExecutor::new(&selectors, &timings, ApprovalPolicy::Detect { max: 3 })
            .execute(&context, &page, &decision())
            .await
            .unwrap();

        assert_eq!(report.approvals_confirmed, 1);
        assert_eq!(confirmations(&context, "confirmation"), 1);
    }

    #[tokio::test]
    async fn test_missing_swap_confirmation_times_out() {
        let selectors = UiSelectors::default();
        let timings = Timings::instant();
        let context = FakeContext::new();
        let page = context
            .main()
            .with(&selectors.from_token)
            .with(&selectors.to_token)
            .with(&selectors.amount_input)
            .with(&selectors.swap_button);

        let err = SwapExecutor::new(&selectors, &timings, ApprovalPolicy::default())
            .execute(&context, &page, &decision())
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(context.count("dapp dom_click .swap-token-button"), 1);
    }

    #[tokio::test]
    async fn test_hidden_confirm_button_is_never_clicked() {
        let selectors = UiSelectors::default();
        let timings = Timings::instant();
        let context = FakeContext::new();
        let confirmation = context.page("confirmation").with_hidden(&selectors.confirm_button);
        let page = context
            .main()
            .with(&selectors.from_token)
            .with(&selectors.to_token)
            .with(&selectors.amount_input)
            .with(&selectors.swap_button)
            .spawns(&selectors.swap_button, vec![confirmation]);

        let err = SwapExecutor::new(&selectors, &timings, ApprovalPolicy::default())
            .execute(&context, &page, &decision())
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(confirmations(&context, "confirmation"), 0);
    }

    #[tokio::test]
    async fn test_confirm_waits_until_enabled() {
        let selectors = UiSelectors::default();
        let timings = Timings::instant();
        let context = FakeContext::new();
        let confirmation = context
            .page("confirmation")
            .with_disabled(&selectors.confirm_button);
        let page = context
            .main()
            .with(&selectors.from_token)
            .with(&selectors.to_token)
            .with(&selectors.amount_input)
            .with(&selectors.swap_button)
            .spawns(&selectors.swap_button, vec![confirmation.clone()]);

        let confirm = selectors.confirm_button.clone();
        let enabler = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            confirmation.enable(&confirm);
        });

        let report = SwapExecutor::new(&selectors, &timings, ApprovalPolicy::default())
            .execute(&context, &page, &decision())
            .await
            .unwrap();
        enabler.await.unwrap();

        assert!(!report.approval_required);
        assert_eq!(confirmations(&context, "confirmation"), 1);
    }

    #[tokio::test]
    async fn test_select_waits_for_token_option() {
        let selectors = UiSelectors::default();
        let timings = Timings::instant();
        let context = FakeContext::new();
        let page = form(&context, &selectors).with_options(&selectors.from_token, &["0xCCC"]);

        let late = page.clone();
        let from = selectors.from_token.clone();
        let loader = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            late.add_option(&from, "0xAAA");
        });

        SwapExecutor::new(&selectors, &timings, ApprovalPolicy::default())
            .execute(&context, &page, &decision())
            .await
            .unwrap();
        loader.await.unwrap();

        assert_eq!(context.count("dapp select .from-swap-token select = 0xAAA"), 1);
    }

    #[tokio::test]
    async fn test_missing_token_option_times_out_before_fill() {
        let selectors = UiSelectors::default();
        let timings = Timings::instant();
        let context = FakeContext::new();
        let page = form(&context, &selectors).with_options(&selectors.to_token, &["0xCCC"]);

        let err = SwapExecutor::new(&selectors, &timings, ApprovalPolicy::default())
            .execute(&context, &page, &decision())
            .await
            .unwrap_err();

        match err {
            Error::Timeout(message) => assert!(message.contains("option 0xBBB")),
            other => panic!("Expected Timeout, got {other:?}"),
        }
        assert!(context.log().iter().all(|e| !e.contains(" fill ")));
    }
}
