//! Shop effects: spending points to clear a debuff, defrag the queue,
//! skip the current problem, buy a rate-limiter buff, or reveal a hint.

use std::time::{Duration, Instant};

use coderoyale_protocol::{BuffType, ShopItem};
use thiserror::Error;

use crate::models::{ActiveBuff, Player, GRACE_PERIOD_SECS};

#[derive(Debug, Error, PartialEq)]
pub enum ShopError {
    #[error("insufficient score to purchase {0:?}")]
    InsufficientScore(ShopItem),
    #[error("{0:?} is on cooldown for another {1}ms")]
    OnCooldown(ShopItem, u64),
}

/// Whether `player` can currently afford and isn't on cooldown for
/// `item`. Does not check that a purchase is semantically meaningful
/// (e.g. `hint` with no current problem is allowed; it's simply a
/// no-op effect).
pub fn can_purchase(player: &Player, item: ShopItem, now: Instant) -> Result<(), ShopError> {
    if player.score < item.cost() {
        return Err(ShopError::InsufficientScore(item));
    }
    if let Some(cooldown_end) = player.shop_cooldowns.get(&item) {
        if now < *cooldown_end {
            let remaining = cooldown_end.saturating_duration_since(now).as_millis() as u64;
            return Err(ShopError::OnCooldown(item, remaining));
        }
    }
    Ok(())
}

/// Applies `item`'s effect to `player`, having already verified
/// affordability via [`can_purchase`]. Deducts cost, records any
/// cooldown, and performs the item-specific mutation. `advance` is
/// called for `skipProblem` to pop the next problem off the queue —
/// the Room supplies this since it also needs to resample when the
/// queue is empty.
pub fn apply_purchase(
    player: &mut Player,
    item: ShopItem,
    now: Instant,
    advance: impl FnOnce(&mut Player),
) {
    player.score -= item.cost();
    if let Some(cooldown_secs) = item.cooldown_secs() {
        player
            .shop_cooldowns
            .insert(item, now + Duration::from_secs(cooldown_secs));
    }

    match item {
        ShopItem::ClearDebuff => {
            player.active_debuff = None;
            player.grace_end = Some(now + Duration::from_secs(GRACE_PERIOD_SECS));
        }
        ShopItem::MemoryDefrag => {
            player.queued.retain(|p| !p.is_garbage);
        }
        ShopItem::SkipProblem => {
            player.current_problem = None;
            player.streak = 0;
            advance(player);
        }
        ShopItem::RateLimiter => {
            player.active_buff = Some(ActiveBuff {
                buff_type: BuffType::RateLimiter,
                ends_at: now + Duration::from_secs(30),
            });
        }
        ShopItem::Hint => {
            reveal_next_hint(player);
        }
    }
}

fn reveal_next_hint(player: &mut Player) {
    let Some(problem) = &player.current_problem else {
        return;
    };
    if player.revealed_hints.len() < problem.hints.len() {
        let next = problem.hints[player.revealed_hints.len()].clone();
        player.revealed_hints.push(next);
    }
}

/// Wire-facing catalog entry, built once per snapshot.
pub fn catalog_entry(item: ShopItem) -> coderoyale_protocol::ShopCatalogEntry {
    coderoyale_protocol::ShopCatalogEntry {
        item,
        cost: item.cost(),
        cooldown_secs: item.cooldown_secs(),
    }
}

pub const ALL_ITEMS: [ShopItem; 5] = [
    ShopItem::ClearDebuff,
    ShopItem::MemoryDefrag,
    ShopItem::SkipProblem,
    ShopItem::RateLimiter,
    ShopItem::Hint,
];
