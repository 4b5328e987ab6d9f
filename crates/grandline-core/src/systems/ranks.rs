//! Rank tables: Yonkou, Shichibukai, Admirals, Gorousei and CypherPol.
//!
//! Every redistribution rebuilds all five tables from scratch, so running it
//! twice on an unchanged world gives the same rows.

use std::collections::BTreeSet;

use grandline_logic::entities::{CharacterType, CrewType, CypherPolAgent, RankEntry};
use grandline_logic::ids::*;
use grandline_logic::ranking::{cypher_pol_island, split_tiers, RankCandidate};

use crate::context::SimContext;
use crate::error::SimResult;
use crate::events::{Importance, WorldEvent, WorldEventKind};
use crate::store::{Table, WorldStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RankSummary {
    pub yonkou: usize,
    pub shichibukai: usize,
    pub admirals: usize,
    pub gorousei: usize,
    pub cypher_pol: usize,
    /// Slots left empty across all tables.
    pub vacancies: usize,
}

fn captains_of(store: &WorldStore, kind: CrewType) -> Vec<RankCandidate> {
    store
        .crews
        .filter(|crew| crew.kind == kind)
        .filter_map(|crew| {
            let captain = store.characters.get(crew.captain_id?)?;
            Some(RankCandidate {
                character_id: captain.id,
                power: store.power_of(captain),
                base_island: Some(crew.current_island),
            })
        })
        .collect()
}

fn government(store: &WorldStore) -> Vec<RankCandidate> {
    store
        .characters
        .filter(|c| c.kind == CharacterType::Government)
        .map(|c| RankCandidate {
            character_id: c.id,
            power: store.power_of(c),
            base_island: c.crew_id.and_then(|crew| store.crews.get(crew)).map(|crew| crew.current_island),
        })
        .collect()
}

fn entry(candidate: &RankCandidate) -> RankEntry {
    RankEntry {
        id: RankEntryId(0),
        character_id: candidate.character_id,
        power: candidate.power,
        base_island: candidate.base_island,
    }
}

fn holders(table: &Table<RankEntry>) -> BTreeSet<CharacterId> {
    table.iter().map(|e| e.character_id).collect()
}

fn announce(ctx: &mut SimContext, title: &str, before: &BTreeSet<CharacterId>, now: &[RankCandidate]) {
    let risen: Vec<String> = now
        .iter()
        .filter(|c| !before.contains(&c.character_id))
        .filter_map(|c| ctx.store.characters.get(c.character_id).map(|ch| ch.name.clone()))
        .collect();
    for name in risen {
        ctx.emit(WorldEvent::new(
            WorldEventKind::Rank,
            Importance::Medium,
            format!("{name} is now one of the {title}"),
            "",
        ));
    }
}

/// Rebuild every rank table from current power.
pub fn redistribute_ranks(ctx: &mut SimContext) -> SimResult<RankSummary> {
    let config = ctx.config.clone();

    let pirates = split_tiers(
        captains_of(&ctx.store, CrewType::Pirate),
        config.yonkou_count as usize,
        config.shichibukai_count as usize,
    );
    let marines = split_tiers(captains_of(&ctx.store, CrewType::Marine), config.admiral_count as usize, 0);
    let government = split_tiers(
        government(&ctx.store),
        config.gorousei_count as usize,
        config.cypher_pol_count as usize,
    );

    let previous_yonkou = holders(&ctx.store.yonkou);
    let previous_admirals = holders(&ctx.store.admirals);
    let previous_gorousei = holders(&ctx.store.gorousei);

    let islands = ctx.store.islands.ids();
    let agents: Vec<CypherPolAgent> = government
        .second
        .iter()
        .filter_map(|candidate| {
            let assigned_island = cypher_pol_island(candidate.character_id, &islands)?;
            Some(CypherPolAgent {
                id: RankEntryId(0),
                character_id: candidate.character_id,
                power: candidate.power,
                base_island: candidate.base_island,
                assigned_island,
            })
        })
        .collect();
    if agents.len() < government.second.len() {
        log::warn!("no islands to post CypherPol agents to");
    }

    let summary = RankSummary {
        yonkou: ctx.store.yonkou.replace_all(pirates.first.iter().map(entry))?,
        shichibukai: ctx.store.shichibukai.replace_all(pirates.second.iter().map(entry))?,
        admirals: ctx.store.admirals.replace_all(marines.first.iter().map(entry))?,
        gorousei: ctx.store.gorousei.replace_all(government.first.iter().map(entry))?,
        cypher_pol: ctx.store.cypher_pol.replace_all(agents)?,
        vacancies: pirates.shortfall + marines.shortfall + government.shortfall,
    };
    if summary.vacancies > 0 {
        log::warn!("rank redistribution left {} slots empty", summary.vacancies);
    }

    announce(ctx, "Yonkou", &previous_yonkou, &pirates.first);
    announce(ctx, "Admirals", &previous_admirals, &marines.first);
    announce(ctx, "Gorousei", &previous_gorousei, &government.first);

    log::debug!("ranks redistributed: {summary:?}");
    Ok(summary)
}
