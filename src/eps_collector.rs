//! EPS acquisition: universe, then cache-first EPS resolution per company.

use tracing::{debug, info, warn};

use crate::api::{CompanyUniverse, EpsSource};
use crate::cache::EpsStore;
use crate::error::{Result, ScreenerError};
use crate::models::{CompanyRecord, EpsObservation, EpsPair, YearWindow};

/// Counters reported at the end of acquisition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    pub companies: usize,
    pub cache_hits: usize,
    pub fetch_calls: usize,
    pub fetched: usize,
    pub unresolved: usize,
    pub cache_errors: usize,
}

#[derive(Debug, Clone)]
pub struct Acquisition {
    pub window: YearWindow,
    pub pairs: Vec<EpsPair>,
    pub stats: AcquisitionStats,
}

/// Resolves (EPS_initial, EPS_latest) for every company in the universe.
///
/// Requests go out strictly one at a time; the EPS source applies its own
/// inter-call delay. Every successful fetch is written to the store before
/// the next one starts, so an interrupted run resumes where it stopped.
pub struct EpsCollector<U, S, F> {
    universe: U,
    store: S,
    source: F,
    limit: Option<usize>,
}

impl<U, S, F> EpsCollector<U, S, F>
where
    U: CompanyUniverse,
    S: EpsStore,
    F: EpsSource,
{
    pub fn new(universe: U, store: S, source: F) -> Self {
        Self {
            universe,
            store,
            source,
            limit: None,
        }
    }

    /// Only process the first `limit` companies
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn source(&self) -> &F {
        &self.source
    }

    /// Load the universe. Any failure here is fatal for the run.
    pub async fn companies(&self) -> Result<Vec<CompanyRecord>> {
        let mut companies = self
            .universe
            .list_companies()
            .await
            .map_err(|e| ScreenerError::UniverseUnavailable(e.to_string()))?;
        if companies.is_empty() {
            return Err(ScreenerError::UniverseUnavailable(
                "universe is empty".to_string(),
            ));
        }
        info!("📋 Universe contains {} companies", companies.len());
        for (idx, company) in companies.iter().enumerate() {
            debug!("{:>4}  {:<8} {}", idx, company.ticker, company.company_name);
        }

        if let Some(limit) = self.limit {
            companies.truncate(limit);
            info!("🔢 Limiting to {} companies", companies.len());
        }
        Ok(companies)
    }

    pub async fn acquire(&self, final_year: i32, years_back: u32) -> Result<Acquisition> {
        let companies = self.companies().await?;
        let window = YearWindow::for_run(final_year, years_back);
        Ok(self.acquire_for(&companies, window).await)
    }

    /// Resolve both window years for each company, in universe order
    pub async fn acquire_for(&self, companies: &[CompanyRecord], window: YearWindow) -> Acquisition {
        info!(
            "📅 Resolving EPS for {} and {} ({} companies)",
            window.initial,
            window.latest,
            companies.len()
        );
        let mut stats = AcquisitionStats {
            companies: companies.len(),
            ..AcquisitionStats::default()
        };
        let mut pairs = Vec::with_capacity(companies.len());

        for (idx, company) in companies.iter().enumerate() {
            let initial = self.resolve(company, window.initial, &mut stats).await;
            let latest = self.resolve(company, window.latest, &mut stats).await;

            info!(
                "{}/{} {}: EPS {} = {}, EPS {} = {}",
                idx + 1,
                companies.len(),
                company.ticker,
                window.initial,
                initial.eps.as_deref().unwrap_or("-"),
                window.latest,
                latest.eps.as_deref().unwrap_or("-"),
            );

            pairs.push(EpsPair {
                company: company.company_name.clone(),
                ticker: company.ticker.clone(),
                eps_initial: initial.eps,
                eps_latest: latest.eps,
            });
        }

        info!(
            "✅ EPS acquisition done: {} cache hits, {} fetches ({} succeeded), {} unresolved",
            stats.cache_hits, stats.fetch_calls, stats.fetched, stats.unresolved
        );
        Acquisition { window, pairs, stats }
    }

    async fn resolve(
        &self,
        company: &CompanyRecord,
        year: i32,
        stats: &mut AcquisitionStats,
    ) -> EpsObservation {
        let ticker = company.ticker.as_str();
        match self.store.get(ticker, year) {
            Ok(Some(eps)) => {
                debug!("[{}] cache hit for {}", ticker, year);
                stats.cache_hits += 1;
                return EpsObservation {
                    ticker: ticker.to_string(),
                    year,
                    eps: Some(eps),
                };
            }
            Ok(None) => {}
            Err(e) => {
                warn!("[{}] cache read for {} failed, fetching instead: {}", ticker, year, e);
                stats.cache_errors += 1;
            }
        }

        stats.fetch_calls += 1;
        let eps = self.source.fetch_eps(ticker, year).await;
        match &eps {
            Some(value) => {
                stats.fetched += 1;
                if let Err(e) = self.store.put(company, year, value) {
                    warn!("[{}] could not cache EPS for {}: {}", ticker, year, e);
                    stats.cache_errors += 1;
                }
            }
            None => stats.unresolved += 1,
        }

        EpsObservation {
            ticker: ticker.to_string(),
            year,
            eps,
        }
    }
}
