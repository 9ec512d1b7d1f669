//! Gameplay intents, hook answers, and the extension handler chain

use serde::Serialize;
use uuid::Uuid;

use super::context::MatchEnv;
use crate::world::{BlockPos, BlockState};

/// How a participant got hurt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageKind {
    Melee,
    Projectile,
    Explosion,
    Fall,
    Void,
    Environment,
}

/// Cause of damage or death
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DamageSource {
    pub kind: DamageKind,
    /// Participant responsible, if any
    pub attacker: Option<Uuid>,
}

impl DamageSource {
    pub fn environment(kind: DamageKind) -> Self {
        Self {
            kind,
            attacker: None,
        }
    }

    pub fn by_player(kind: DamageKind, attacker: Uuid) -> Self {
        Self {
            kind,
            attacker: Some(attacker),
        }
    }
}

/// Non-player entity a participant interacted with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Player(Uuid),
    Other(u64),
}

/// Item stack as far as the match cares
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemStack {
    pub item: String,
    pub count: u32,
}

/// Raw gameplay intent forwarded by the connection layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    Respawn {
        player: Uuid,
    },
    Death {
        victim: Uuid,
        source: DamageSource,
    },
    Damage {
        victim: Uuid,
        source: DamageSource,
        amount: f32,
    },
    BlockBreak {
        player: Uuid,
        pos: BlockPos,
    },
    BlockUse {
        player: Uuid,
        pos: BlockPos,
    },
    BlockPlace {
        player: Uuid,
        pos: BlockPos,
        block: BlockState,
    },
    UseEntity {
        player: Uuid,
        target: EntityRef,
    },
    AttackBlock {
        player: Uuid,
        pos: BlockPos,
    },
    AttackEntity {
        player: Uuid,
        target: EntityRef,
    },
    ItemDropped {
        player: Uuid,
        item: ItemStack,
    },
    ItemAcquired {
        player: Uuid,
        item: ItemStack,
    },
}

impl Intent {
    /// Participant the intent originates from (or happens to)
    pub fn actor(&self) -> Uuid {
        match self {
            Intent::Death { victim, .. } | Intent::Damage { victim, .. } => *victim,
            Intent::Respawn { player }
            | Intent::BlockBreak { player, .. }
            | Intent::BlockUse { player, .. }
            | Intent::BlockPlace { player, .. }
            | Intent::UseEntity { player, .. }
            | Intent::AttackBlock { player, .. }
            | Intent::AttackEntity { player, .. }
            | Intent::ItemDropped { player, .. }
            | Intent::ItemAcquired { player, .. } => *player,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Intent::Respawn { .. } => "respawn",
            Intent::Death { .. } => "death",
            Intent::Damage { .. } => "damage",
            Intent::BlockBreak { .. } => "block_break",
            Intent::BlockUse { .. } => "block_use",
            Intent::BlockPlace { .. } => "block_place",
            Intent::UseEntity { .. } => "use_entity",
            Intent::AttackBlock { .. } => "attack_block",
            Intent::AttackEntity { .. } => "attack_entity",
            Intent::ItemDropped { .. } => "item_dropped",
            Intent::ItemAcquired { .. } => "item_acquired",
        }
    }
}

/// Answer of an interaction hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionResult {
    /// No opinion; let the next handler or the host default decide
    Pass,
    /// Allow and stop asking
    Success,
    /// Reject the action
    Fail,
}

impl ActionResult {
    pub fn allow_if(condition: bool) -> Self {
        if condition {
            ActionResult::Pass
        } else {
            ActionResult::Fail
        }
    }
}

/// Answer of the damage hook
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageOutcome {
    Apply(f32),
    /// Swallow the hit entirely
    Absorb,
}

/// Final allow/deny the connection layer must honor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    Deny,
}

impl Verdict {
    pub fn from_allowed(allowed: bool) -> Self {
        if allowed {
            Verdict::Allow
        } else {
            Verdict::Deny
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

impl From<ActionResult> for Verdict {
    fn from(result: ActionResult) -> Self {
        match result {
            ActionResult::Pass | ActionResult::Success => Verdict::Allow,
            ActionResult::Fail => Verdict::Deny,
        }
    }
}

impl From<DamageOutcome> for Verdict {
    fn from(outcome: DamageOutcome) -> Self {
        match outcome {
            DamageOutcome::Apply(_) => Verdict::Allow,
            DamageOutcome::Absorb => Verdict::Deny,
        }
    }
}

/// Extension handler consulted before the active state
pub type Handler = Box<dyn FnMut(&MatchEnv, &Intent) -> ActionResult + Send>;

/// Ordered handlers; the first non-`Pass` answer wins
#[derive(Default)]
pub struct HookChain {
    handlers: Vec<(&'static str, Handler)>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, name: &'static str, handler: F)
    where
        F: FnMut(&MatchEnv, &Intent) -> ActionResult + Send + 'static,
    {
        self.handlers.push((name, Box::new(handler)));
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Fold left to right, returning early on the first decisive answer
    pub fn evaluate(&mut self, env: &MatchEnv, intent: &Intent) -> ActionResult {
        for (name, handler) in self.handlers.iter_mut() {
            let result = handler(env, intent);
            if result != ActionResult::Pass {
                tracing::debug!(handler = *name, intent = intent.name(), ?result, "Hook chain decided");
                return result;
            }
        }
        ActionResult::Pass
    }
}
