//! Campaign/Ad Lifecycle Coordinator (SPEC_FULL.md §4.9).
//!
//! Every create/update/delete here moves money between a wallet and a
//! campaign's or ad's `spent` counter in the same breath as the row
//! mutation. None of these operations span a single database transaction
//! across both tables (the wallet ledger and the budget store each commit
//! their own), so failures partway through are compensated explicitly —
//! e.g. a campaign row is deleted if the wallet debit backing it fails —
//! rather than relying on a shared transaction to roll everything back.

use chrono::{DateTime, Utc};
use primitives::{
    dto::{CreateAdRequest, CreateCampaignRequest, UpdateAdRequest, UpdateCampaignRequest},
    error::CoreError,
    money::Money,
    Ad, AdBudget, Campaign, CampaignId, TeamId, UserId, WalletId,
};

use crate::db::{self, DbPool};

const WALLET_CURRENCY: &str = "USD";

fn validate_date_range(
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), CoreError> {
    if let Some(start) = start_date {
        if start < now {
            return Err(CoreError::validation("startDate must not be in the past"));
        }
    }
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if end <= start {
            return Err(CoreError::validation("endDate must be after startDate"));
        }
    }
    Ok(())
}

/// Creates a campaign and, if it carries a budget, debits the owner's
/// wallet by that amount. Rolls the campaign row back on a failed debit
/// rather than leaving an unfunded campaign on the books.
pub async fn create_campaign(
    pool: &DbPool,
    team_id: TeamId,
    owner_user_id: UserId,
    request: &CreateCampaignRequest,
    now: DateTime<Utc>,
) -> Result<Campaign, CoreError> {
    validate_date_range(request.start_date, request.end_date, now)?;

    let campaign = db::campaign::insert_campaign(
        pool,
        team_id,
        owner_user_id,
        request.budget,
        request.start_date,
        request.end_date,
    )
    .await
    .map_err(|err| CoreError::internal(format!("database error: {err}")))?;

    if let Some(budget) = request.budget.filter(|budget| budget.to_cents() > 0) {
        let wallet = db::wallet::get_or_create_wallet(pool, owner_user_id, WALLET_CURRENCY)
            .await
            .map_err(|err| CoreError::internal(format!("database error: {err}")))?;

        if let Err(err) =
            db::wallet::deduct_campaign_budget(pool, wallet.id, campaign.id, budget).await
        {
            let _ = db::campaign::delete_campaign(pool, campaign.id).await;
            return Err(err);
        }
    }

    Ok(campaign)
}

/// Applies an update, debiting or refunding the owner's wallet for any
/// change in budget (§4.9). The wallet move happens before the row update,
/// so a failed field update is compensated by reversing it rather than
/// leaving the wallet out of step with the campaign's budget.
pub async fn update_campaign(
    pool: &DbPool,
    campaign_id: CampaignId,
    request: &UpdateCampaignRequest,
    now: DateTime<Utc>,
) -> Result<Campaign, CoreError> {
    let existing = db::campaign::fetch_campaign(pool, campaign_id)
        .await
        .map_err(|err| CoreError::internal(format!("database error: {err}")))?
        .ok_or(CoreError::NotFound("campaign"))?;

    let next_start = request.start_date.or(existing.start_date);
    let next_end = request.end_date.or(existing.end_date);
    validate_date_range(next_start, next_end, now)?;

    // (wallet id, amount, was_debit) of the wallet move applied below, if
    // any, so it can be reversed if the field update that follows fails.
    let mut wallet_move: Option<(WalletId, Money, bool)> = None;

    if let Some(next_budget) = request.budget {
        let current = existing.budget.unwrap_or(Money::ZERO);
        let wallet =
            db::wallet::get_or_create_wallet(pool, existing.owner_user_id, WALLET_CURRENCY)
                .await
                .map_err(|err| CoreError::internal(format!("database error: {err}")))?;

        if next_budget > current {
            let delta = next_budget.saturating_sub(&current);
            db::wallet::deduct_campaign_budget(pool, wallet.id, campaign_id, delta).await?;
            wallet_move = Some((wallet.id, delta, true));
        } else if next_budget < current {
            let delta = current.saturating_sub(&next_budget);
            db::wallet::refund_campaign_budget(pool, wallet.id, campaign_id, delta).await?;
            wallet_move = Some((wallet.id, delta, false));
        }
    }

    let updated = db::campaign::update_campaign_fields(
        pool,
        campaign_id,
        None,
        request.budget.map(Some),
        request.start_date.map(Some),
        request.end_date.map(Some),
    )
    .await;

    match updated {
        Ok(campaign) => Ok(campaign),
        Err(err) => {
            if let Some((wallet_id, amount, was_debit)) = wallet_move {
                let _ = if was_debit {
                    db::wallet::refund_campaign_budget(pool, wallet_id, campaign_id, amount).await
                } else {
                    db::wallet::deduct_campaign_budget(pool, wallet_id, campaign_id, amount).await
                };
            }
            Err(CoreError::internal(format!("database error: {err}")))
        }
    }
}

/// Hard-deletes a campaign (cascading to its ads and impressions per the
/// schema's foreign keys) and refunds any unspent budget to the owner.
pub async fn delete_campaign(pool: &DbPool, campaign_id: CampaignId) -> Result<(), CoreError> {
    let existing = db::campaign::fetch_campaign(pool, campaign_id)
        .await
        .map_err(|err| CoreError::internal(format!("database error: {err}")))?
        .ok_or(CoreError::NotFound("campaign"))?;

    let refund = existing
        .budget
        .map(|budget| budget.saturating_sub(&existing.spent));

    db::campaign::delete_campaign(pool, campaign_id)
        .await
        .map_err(|err| CoreError::internal(format!("database error: {err}")))?;

    if let Some(refund) = refund.filter(|amount| amount.to_cents() > 0) {
        let wallet = db::wallet::get_or_create_wallet(pool, existing.owner_user_id, WALLET_CURRENCY)
            .await
            .map_err(|err| CoreError::internal(format!("database error: {err}")))?;
        db::wallet::refund_campaign_budget(pool, wallet.id, campaign_id, refund).await?;
    }

    Ok(())
}

/// Validates a requested ad budget against what's already allocated under
/// the campaign (§4.4's `validateAdBudget`): `None`/`Inherit` is always
/// valid, an explicit amount must fit within whatever the campaign has
/// left after existing ad allocations.
async fn validate_ad_budget(
    pool: &DbPool,
    campaign: &Campaign,
    requested: AdBudget,
    excluding_current: Option<Money>,
) -> Result<(), CoreError> {
    let Some(requested_amount) = requested.amount() else {
        return Ok(());
    };

    let Some(campaign_budget) = campaign.budget else {
        return Ok(());
    };

    let allocated = db::ad::sum_allocated_ad_budget(pool, campaign.id)
        .await
        .map_err(|err| CoreError::internal(format!("database error: {err}")))?;
    let allocated = allocated.saturating_sub(&excluding_current.unwrap_or(Money::ZERO));
    let remaining = campaign_budget.saturating_sub(&allocated);

    if requested_amount > remaining {
        return Err(CoreError::BudgetExceeded {
            entity: "campaign",
            id: campaign.id.to_string(),
            spent: allocated.to_string(),
            budget: campaign_budget.to_string(),
        });
    }

    Ok(())
}

/// Creates an ad, allocating its requested budget share against the
/// parent campaign's `spent` counter. Deletes the ad row if that
/// allocation fails rather than leaving an unbudgeted ad in place.
#[allow(clippy::too_many_arguments)]
pub async fn create_ad(
    pool: &DbPool,
    campaign_id: CampaignId,
    request: &CreateAdRequest,
) -> Result<Ad, CoreError> {
    let campaign = db::campaign::fetch_campaign(pool, campaign_id)
        .await
        .map_err(|err| CoreError::internal(format!("database error: {err}")))?
        .ok_or(CoreError::NotFound("campaign"))?;

    let budget = AdBudget::from_sentinel(request.budget_cents.unwrap_or(AdBudget::INHERIT_SENTINEL))
        .unwrap_or(AdBudget::Inherit);

    validate_ad_budget(pool, &campaign, budget, None).await?;

    let ad = db::ad::insert_ad(
        pool,
        campaign_id,
        budget,
        &request.categories,
        &request.tags,
        &request.title,
        &request.description,
        &request.video_url,
        &request.thumbnail_url,
        request.cta_link.as_deref(),
    )
    .await
    .map_err(|err| CoreError::internal(format!("database error: {err}")))?;

    if let Some(amount) = budget.amount().filter(|amount| amount.to_cents() > 0) {
        if let Err(err) =
            db::campaign::adjust_campaign_spent(pool, campaign_id, amount.to_cents() as i64).await
        {
            let _ = db::ad::delete_ad(pool, ad.id).await;
            return Err(err);
        }
    }

    Ok(ad)
}

/// Applies an ad update, re-validating and re-allocating the campaign
/// `spent` delta when the budget changes (§4.9). The campaign adjustment
/// happens before the ad row update; a failed row update is compensated by
/// reversing the adjustment rather than leaving `campaign.spent` drifted.
pub async fn update_ad(
    pool: &DbPool,
    ad_id: primitives::AdId,
    request: &UpdateAdRequest,
) -> Result<Ad, CoreError> {
    let existing = db::ad::fetch_ad(pool, ad_id)
        .await
        .map_err(|err| CoreError::internal(format!("database error: {err}")))?
        .ok_or(CoreError::NotFound("ad"))?;

    let campaign = db::campaign::fetch_campaign(pool, existing.campaign_id)
        .await
        .map_err(|err| CoreError::internal(format!("database error: {err}")))?
        .ok_or(CoreError::NotFound("campaign"))?;

    let next_budget = match request.budget_cents {
        Some(cents) => AdBudget::from_sentinel(cents).unwrap_or(AdBudget::Inherit),
        None => existing.budget,
    };

    let mut applied_delta = 0i64;
    if next_budget != existing.budget {
        validate_ad_budget(pool, &campaign, next_budget, existing.budget.amount()).await?;

        let old_cents = existing.budget.amount().map_or(0, |m| m.to_cents() as i64);
        let new_cents = next_budget.amount().map_or(0, |m| m.to_cents() as i64);
        let delta = new_cents - old_cents;

        if delta != 0 {
            db::campaign::adjust_campaign_spent(pool, existing.campaign_id, delta).await?;
            applied_delta = delta;
        }
    }

    let updated = db::ad::update_ad_fields(
        pool,
        ad_id,
        None,
        Some(next_budget),
        request.categories.clone(),
        request.tags.clone(),
        request.title.clone(),
        request.description.clone(),
        request.cta_link.clone().map(Some),
    )
    .await;

    match updated {
        Ok(ad) => Ok(ad),
        Err(err) => {
            if applied_delta != 0 {
                let _ =
                    db::campaign::adjust_campaign_spent(pool, existing.campaign_id, -applied_delta)
                        .await;
            }
            Err(CoreError::internal(format!("database error: {err}")))
        }
    }
}

/// Deletes an ad and frees its allocated share back onto the campaign's
/// `spent` counter. The campaign is credited back before the ad row is
/// deleted; if the delete then fails, the credit is reversed so the two
/// stay in step.
pub async fn delete_ad(pool: &DbPool, ad_id: primitives::AdId) -> Result<(), CoreError> {
    let existing = db::ad::fetch_ad(pool, ad_id)
        .await
        .map_err(|err| CoreError::internal(format!("database error: {err}")))?
        .ok_or(CoreError::NotFound("ad"))?;

    let freed = existing.budget.amount().filter(|amount| amount.to_cents() > 0);

    if let Some(amount) = freed {
        db::campaign::adjust_campaign_spent(
            pool,
            existing.campaign_id,
            -(amount.to_cents() as i64),
        )
        .await?;
    }

    if let Err(err) = db::ad::delete_ad(pool, ad_id).await {
        if let Some(amount) = freed {
            let _ = db::campaign::adjust_campaign_spent(
                pool,
                existing.campaign_id,
                amount.to_cents() as i64,
            )
            .await;
        }
        return Err(CoreError::internal(format!("database error: {err}")));
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Duration;

    #[test]
    fn validate_date_range_rejects_a_past_start_date() {
        let now = Utc::now();
        let result = validate_date_range(Some(now - Duration::days(1)), None, now);
        assert!(result.is_err());
    }

    #[test]
    fn validate_date_range_rejects_end_before_start() {
        let now = Utc::now();
        let start = Some(now + Duration::days(1));
        let end = Some(now);
        assert!(validate_date_range(start, end, now).is_err());
    }

    #[test]
    fn validate_date_range_accepts_a_sensible_window() {
        let now = Utc::now();
        let start = Some(now + Duration::days(1));
        let end = Some(now + Duration::days(30));
        assert!(validate_date_range(start, end, now).is_ok());
    }
}
