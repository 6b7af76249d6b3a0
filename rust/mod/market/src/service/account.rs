use tracing::info;

use vhub_core::{new_id, now_rfc3339};

use crate::model::{
    Account, AccountKind, AccountView, Actor, ProfilePatch, SignUp, DEFAULT_SERVICE_HOURS_GOAL,
    MAX_SERVICE_HOURS_GOAL,
};
use crate::policy::{account_view, Operation};
use crate::service::session::hash_password;
use crate::service::{parse_patch, require_text, MarketError, MarketService};

/// Shortest accepted password.
const MIN_PASSWORD_LEN: usize = 8;

impl MarketService {
    /// Create an account. Organizations always start unverified.
    pub fn sign_up(&self, input: SignUp) -> Result<AccountView, MarketError> {
        let email = normalize_email(&input.email)?;
        if input.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(MarketError::invalid(
                "password",
                format!("password must be at least {} characters", MIN_PASSWORD_LEN),
            ));
        }
        require_text("display_name", &input.display_name)?;

        let (goal, total) = match input.kind {
            AccountKind::Student => {
                let goal = input.service_hours_goal.unwrap_or(DEFAULT_SERVICE_HOURS_GOAL);
                check_goal(goal)?;
                (Some(goal), Some(0))
            }
            AccountKind::Organization => {
                if input.service_hours_goal.is_some() {
                    return Err(MarketError::invalid(
                        "service_hours_goal",
                        "only students have a service hours goal",
                    ));
                }
                (None, None)
            }
        };

        let password_hash = hash_password(&input.password)?;
        let now = now_rfc3339();
        let account = Account {
            id: new_id(),
            email,
            kind: input.kind,
            verified: false,
            display_name: input.display_name.trim().to_string(),
            phone: non_empty(input.phone),
            address: non_empty(input.address),
            city: non_empty(input.city),
            website: non_empty(input.website),
            bio: non_empty(input.bio),
            service_hours_goal: goal,
            total_hours_logged: total,
            created_at: now.clone(),
            updated_at: now,
        };

        self.with_retry("sign_up", |s| s.insert_account(&account, &password_hash))
            .map_err(|e| match e {
                MarketError::ConflictFailed(_) => {
                    MarketError::ConflictFailed(format!("email {} is already registered", account.email))
                }
                e => e,
            })?;

        info!(account_id = %account.id, kind = %account.kind, "account created");
        Ok(AccountView::private(&account))
    }

    /// Read an account, showing private fields only to the account itself.
    pub fn get_account(&self, actor: &Actor, id: &str) -> Result<AccountView, MarketError> {
        let account = self.with_retry("get_account", |s| s.get_account(id))?;
        Ok(account_view(actor, &account))
    }

    /// The acting account's own full view.
    pub fn me(&self, actor: &Actor) -> Result<AccountView, MarketError> {
        let id = actor.id().ok_or(MarketError::AuthenticationRequired)?;
        self.get_account(actor, id)
    }

    /// Apply a JSON profile patch. Keys outside [`ProfilePatch::FIELDS`],
    /// `verified` among them, are refused before anything is written.
    pub fn update_profile(
        &self,
        actor: &Actor,
        id: &str,
        body: serde_json::Value,
    ) -> Result<AccountView, MarketError> {
        self.authorize(actor, Operation::UpdateProfile { account_id: id })?;
        let patch: ProfilePatch = parse_patch(body, ProfilePatch::FIELDS)?;
        self.apply_profile_patch(actor, id, patch)
    }

    /// Typed form of [`update_profile`](Self::update_profile).
    pub fn apply_profile_patch(
        &self,
        actor: &Actor,
        id: &str,
        patch: ProfilePatch,
    ) -> Result<AccountView, MarketError> {
        self.authorize(actor, Operation::UpdateProfile { account_id: id })?;
        if patch.is_empty() {
            return Err(MarketError::invalid("body", "nothing to update"));
        }
        if let Some(ref name) = patch.display_name {
            require_text("display_name", name)?;
        }
        if let Some(goal) = patch.service_hours_goal {
            if actor.kind() != Some(AccountKind::Student) {
                return Err(MarketError::invalid(
                    "service_hours_goal",
                    "only students have a service hours goal",
                ));
            }
            check_goal(goal)?;
        }

        let now = now_rfc3339();
        self.with_retry("update_profile", |s| s.update_profile(id, &patch, &now))?;
        self.get_account(actor, id)
    }

    /// Set an organization's verified flag.
    ///
    /// Only the external verifier may call this; it takes no actor and is
    /// not reachable through the marketplace routes.
    pub fn set_verified(&self, id: &str, verified: bool) -> Result<AccountView, MarketError> {
        let account = self.with_retry("set_verified", |s| s.get_account(id))?;
        if account.kind != AccountKind::Organization {
            return Err(MarketError::invalid(
                "verified",
                "only organizations can be verified",
            ));
        }

        let now = now_rfc3339();
        if !self.with_retry("set_verified", |s| s.set_verified(id, verified, &now))? {
            return Err(MarketError::NotFound(format!("organization {id}")));
        }
        info!(account_id = %id, verified, "organization verification changed");

        let account = self.with_retry("set_verified", |s| s.get_account(id))?;
        Ok(AccountView::private(&account))
    }
}

fn normalize_email(raw: &str) -> Result<String, MarketError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid {
        return Err(MarketError::invalid("email", "not a valid email address"));
    }
    Ok(email)
}

fn check_goal(goal: i64) -> Result<(), MarketError> {
    if !(1..=MAX_SERVICE_HOURS_GOAL).contains(&goal) {
        return Err(MarketError::invalid(
            "service_hours_goal",
            format!("service hours goal must be between 1 and {MAX_SERVICE_HOURS_GOAL}"),
        ));
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
