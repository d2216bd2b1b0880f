//! Per-job credential discovery state machine
//!
//! A [`DiscoveryChain`] decides which credential context the next attempt uses.
//! It is pure: it never spawns processes or touches the cache. The job task feeds
//! it each attempt's exit outcome and applies the side effects itself.
//!
//! Candidates are the cached context (if any) followed by the configured order.
//! A context is never tried twice within one chain, so a cached entry that is
//! also part of the order is skipped when the order comes up.

use crate::runner::ExitOutcome;
use crate::types::{CANCELLED_EXIT_CODE, CredentialContext};

/// Where a chain currently stands
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainState {
    /// An attempt with `context` should run (or is running)
    Trying {
        /// Context for this attempt
        context: CredentialContext,
        /// Whether the context came from the process-wide cache
        from_cache: bool,
    },
    /// An attempt exited zero
    Succeeded {
        /// The context that worked
        context: CredentialContext,
    },
    /// Every candidate failed
    Exhausted {
        /// Exit code of the final attempt (`None` if it was killed by a signal)
        last_exit_code: Option<i32>,
        /// Context of the final attempt
        last_context: Option<CredentialContext>,
    },
    /// The job was cancelled; no further attempts
    Cancelled {
        /// Exit code reported to observers
        exit_code: i32,
        /// Context that was active when the job was cancelled
        context: Option<CredentialContext>,
    },
}

impl ChainState {
    /// Whether no further attempts will be made
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChainState::Trying { .. })
    }
}

/// Credential discovery for one job
#[derive(Clone, Debug)]
pub struct DiscoveryChain {
    order: Vec<CredentialContext>,
    tried: Vec<CredentialContext>,
    state: ChainState,
    // whether the current context's attempt has actually been spawned
    launched: bool,
}

impl DiscoveryChain {
    /// Start a chain from the configured order and a snapshot of the cache
    pub fn new(order: Vec<CredentialContext>, cached: Option<CredentialContext>) -> Self {
        let mut chain = Self {
            order,
            tried: Vec::new(),
            launched: false,
            state: ChainState::Exhausted {
                last_exit_code: None,
                last_context: None,
            },
        };

        chain.state = match cached {
            Some(context) => chain.enter(context, true),
            None => chain.advance(None, None),
        };
        chain
    }

    /// Current state
    pub fn state(&self) -> &ChainState {
        &self.state
    }

    /// Context of the attempt that should run now, if any
    pub fn current(&self) -> Option<&CredentialContext> {
        match &self.state {
            ChainState::Trying { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Contexts handed out so far, in order
    pub fn tried(&self) -> &[CredentialContext] {
        &self.tried
    }

    /// Whether no further attempts will be made
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Feed the outcome of the current attempt and move to the next state
    ///
    /// Outcomes arriving after the chain finished (for instance the exit of a
    /// process killed by cancellation) leave the state unchanged.
    pub fn on_exit(&mut self, outcome: ExitOutcome) -> &ChainState {
        let ChainState::Trying { context, .. } = &self.state else {
            return &self.state;
        };
        let context = context.clone();

        self.state = if outcome.success() {
            ChainState::Succeeded { context }
        } else {
            self.advance(Some(context), outcome.code)
        };
        &self.state
    }

    /// Record that the attempt for the current context was spawned
    pub fn mark_launched(&mut self) {
        if matches!(self.state, ChainState::Trying { .. }) {
            self.launched = true;
        }
    }

    /// Stop the chain; no-op once it already finished
    ///
    /// The cancelled state names the current context only if its attempt was
    /// launched.
    pub fn cancel(&mut self) -> &ChainState {
        if let ChainState::Trying { context, .. } = &self.state {
            self.state = ChainState::Cancelled {
                exit_code: CANCELLED_EXIT_CODE,
                context: self.launched.then(|| context.clone()),
            };
        }
        &self.state
    }

    fn enter(&mut self, context: CredentialContext, from_cache: bool) -> ChainState {
        self.launched = false;
        self.tried.push(context.clone());
        ChainState::Trying {
            context,
            from_cache,
        }
    }

    fn advance(
        &mut self,
        last_context: Option<CredentialContext>,
        last_exit_code: Option<i32>,
    ) -> ChainState {
        let next = self
            .order
            .iter()
            .find(|candidate| !self.tried.contains(candidate))
            .cloned();

        match next {
            Some(context) => self.enter(context, false),
            None => ChainState::Exhausted {
                last_exit_code,
                last_context,
            },
        }
    }
}
