//! Shared state threaded through all handlers.

use std::sync::Arc;

use canvass_core::{
  analytics::{AnalyticsAggregator, AnalyticsOptions},
  channel::{Adapters, ChannelAdapter},
  dispatch::{DispatchConfig, DispatchEngine},
  intake::Intake,
  store::SurveyStore,
};

/// The store plus the three services built on top of it.
///
/// Every field is behind an [`Arc`], so cloning per request is cheap.
pub struct AppState<S, A> {
  pub store:     Arc<S>,
  pub dispatch:  Arc<DispatchEngine<S, A>>,
  pub intake:    Arc<Intake<S>>,
  pub analytics: Arc<AnalyticsAggregator<S>>,
}

impl<S, A> AppState<S, A>
where
  S: SurveyStore,
  A: ChannelAdapter,
{
  pub fn new(
    store: Arc<S>,
    adapters: Adapters<A>,
    dispatch: DispatchConfig,
    analytics: AnalyticsOptions,
  ) -> Self {
    Self {
      dispatch:  Arc::new(DispatchEngine::new(store.clone(), adapters, dispatch)),
      intake:    Arc::new(Intake::new(store.clone())),
      analytics: Arc::new(AnalyticsAggregator::new(store.clone(), analytics)),
      store,
    }
  }
}

// Manual impl: deriving would demand `S: Clone` and `A: Clone`.
impl<S, A> Clone for AppState<S, A> {
  fn clone(&self) -> Self {
    Self {
      store:     self.store.clone(),
      dispatch:  self.dispatch.clone(),
      intake:    self.intake.clone(),
      analytics: self.analytics.clone(),
    }
  }
}
