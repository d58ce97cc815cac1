use crate::core::random::{pick, RandomSource};
use crate::domain::model::{CustomAttributes, DomainSpec, StartupData, SyntheticUser, UserContext};
use crate::utils::error::{Result, SimError};
use std::sync::Arc;

/// Upper bound on one generated population.
pub const MAX_USERS: usize = 100_000;

pub struct UserGenerator {
    random: Arc<dyn RandomSource>,
}

impl UserGenerator {
    pub fn new(random: Arc<dyn RandomSource>) -> Self {
        Self { random }
    }

    /// Builds one synthetic user per configured slot, domain by domain, with
    /// the optional ad hoc domain appended last.
    pub fn generate(
        &self,
        startup: &StartupData,
        extra: Option<&DomainSpec>,
    ) -> Result<Vec<SyntheticUser>> {
        let domains: Vec<&DomainSpec> = startup.domains.iter().chain(extra).collect();
        let total = domains
            .iter()
            .try_fold(0usize, |acc, d| acc.checked_add(d.user_count))
            .filter(|total| *total <= MAX_USERS)
            .ok_or_else(|| SimError::GenerationError {
                message: format!("population exceeds {} users", MAX_USERS),
            })?;

        if total == 0 {
            tracing::debug!("No users configured, generating an empty population");
            return Ok(Vec::new());
        }

        ensure_candidates("countries", &startup.countries)?;
        ensure_candidates("subscription_types", &startup.subscription_types)?;
        ensure_candidates("tenants", &startup.tenants)?;

        let mut users = Vec::with_capacity(total);
        for domain in domains {
            for _ in 0..domain.user_count {
                let email = self.email_for(&domain.email_domain);
                users.push(SyntheticUser::new(self.context_for(email, startup)?));
            }
        }

        tracing::debug!("Generated {} synthetic users", users.len());
        Ok(users)
    }

    fn email_for(&self, domain: &str) -> String {
        let name: String = self
            .random
            .name()
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        format!("{}@{}", name, domain.trim().trim_start_matches('@'))
    }

    fn context_for(&self, email: String, startup: &StartupData) -> Result<UserContext> {
        let random = self.random.as_ref();
        Ok(UserContext {
            identifier: random.identifier(),
            email,
            country: pick_candidate(random, "countries", &startup.countries)?,
            custom: CustomAttributes {
                subscription_type: pick_candidate(
                    random,
                    "subscription_types",
                    &startup.subscription_types,
                )?,
                tenant: pick_candidate(random, "tenants", &startup.tenants)?,
            },
        })
    }
}

fn ensure_candidates(field: &str, candidates: &[String]) -> Result<()> {
    if candidates.is_empty() {
        return Err(SimError::GenerationError {
            message: format!("no candidate {} configured", field),
        });
    }
    Ok(())
}

fn pick_candidate(random: &dyn RandomSource, field: &str, candidates: &[String]) -> Result<String> {
    pick(random, candidates)
        .cloned()
        .ok_or_else(|| SimError::GenerationError {
            message: format!("no candidate {} configured", field),
        })
}
