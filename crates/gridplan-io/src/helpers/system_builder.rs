//! Component builder.
//!
//! [`SystemBuilder`] turns raw datasets into a [`System`] in dependency
//! order: regions, generators, transmission, reserves, demand, emissions,
//! capacity-factor profiles and finally derived reserve requirements. It is
//! the only writer of the system, and it visits datasets, rows and labels in
//! a fixed order, so the result never depends on how the reads were
//! scheduled.
//!
//! Variable generators (wind and solar) are aggregated per technology and
//! region: rows for different vintages add up to one generator whose id
//! carries no vintage.
//!
//! Every source record is accounted for in [`BuildStats`]: it is built,
//! merged into an identical record, excluded by technology, filtered by year
//! or binding, or dropped with a gap entry. Under [`BuildPolicy::Strict`] a
//! record that would be dropped aborts the build instead.

use std::collections::{BTreeMap, BTreeSet};

use gridplan_core::{
    hierarchy_depth, region_ancestors, BuildError, BuildResult, DemandId, DemandProfile,
    EmissionRecord, EmissionSource, EmissionType, GapReport, Generator, GeneratorId, LinkId,
    Megawatts, Region, RegionAttributes, RegionId, RegionLevel, Reserve, ReserveDirection,
    ReserveId, ReserveRequirement, ReserveType, System, TechnologyCategory, TonnesPerMwh,
    TransmissionLink,
};
use gridplan_ts::{monthly_to_hourly, reserve_requirement, CapacityProfile};
use tracing::{info, warn};

use super::BuildStats;
use crate::align::{align_values, ProfileCache};
use crate::classify::{Classification, RuleSet};
use crate::config::{BuildConfig, BuildPolicy};
use crate::mapping::names;
use crate::readers::RawDataset;
use crate::rows::{
    CapacityRow, EmissionRow, FuelRow, HierarchyRow, HydroRow, ReserveRow, TransmissionRow,
};

/// Series bound to demand profiles.
pub const LOAD_SERIES: &str = "max_active_power";
/// Series bound to variable and hydro generators.
pub const CAPACITY_FACTOR_SERIES: &str = "capacity_factor";
/// Series bound to reserves with a derived requirement.
pub const REQUIREMENT_SERIES: &str = "requirement";

pub struct SystemBuilder<'a> {
    config: &'a BuildConfig,
    rules: &'a RuleSet,
    policy: BuildPolicy,
    system: System,
    report: GapReport,
    stats: BuildStats,
    cache: ProfileCache,
}

/// Corridor between two regions, keyed with `from < to`.
#[derive(Debug, Default)]
struct Corridor {
    forward: Option<Megawatts>,
    reverse: Option<Megawatts>,
}

/// Non-empty aggregate levels of a hierarchy row, coarsest first, each with
/// its parent.
fn aggregate_chain(row: &HierarchyRow) -> Vec<(RegionLevel, RegionId, Option<RegionId>)> {
    let levels = [
        (RegionLevel::Country, &row.country),
        (RegionLevel::Interconnect, &row.interconnect),
        (RegionLevel::TransmissionRegion, &row.transmission_region),
    ];
    let mut chain = Vec::new();
    let mut parent: Option<RegionId> = None;
    for (level, value) in levels {
        let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) else {
            continue;
        };
        let id = RegionId::new(value);
        chain.push((level, id.clone(), parent.take()));
        parent = Some(id);
    }
    chain
}

type Aggregates = BTreeMap<RegionId, (RegionLevel, Option<RegionId>)>;

/// Why a hierarchy row for balancing area `id` cannot join the regions seen
/// so far. Ids are unique across levels and an aggregate keeps one level and
/// one parent.
fn hierarchy_conflict(
    id: &RegionId,
    chain: &[(RegionLevel, RegionId, Option<RegionId>)],
    aggregates: &Aggregates,
    areas: &BTreeMap<RegionId, HierarchyRow>,
) -> Option<String> {
    if aggregates.contains_key(id) {
        return Some(format!("'{id}' is already an aggregate region"));
    }
    chain.iter().find_map(|(level, agg, parent)| {
        if agg == id || areas.contains_key(agg) {
            return Some(format!(
                "'{agg}' is both a balancing area and {}",
                level.as_str()
            ));
        }
        let (known_level, known_parent) = aggregates.get(agg)?;
        if known_level != level {
            Some(format!(
                "'{agg}' is both {} and {}",
                known_level.as_str(),
                level.as_str()
            ))
        } else if known_parent != parent {
            Some(format!(
                "'{agg}' has conflicting parents {:?} and {:?}",
                known_parent.as_ref().map(RegionId::as_str),
                parent.as_ref().map(RegionId::as_str)
            ))
        } else {
            None
        }
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl<'a> SystemBuilder<'a> {
    /// `report` carries gaps already recorded while resolving the mapping.
    pub fn new(config: &'a BuildConfig, rules: &'a RuleSet, report: GapReport) -> Self {
        Self {
            config,
            rules,
            policy: config.policy(),
            system: System::new(),
            report,
            stats: BuildStats::new(),
            cache: ProfileCache::new(),
        }
    }

    pub fn build(
        mut self,
        datasets: &BTreeMap<String, RawDataset>,
    ) -> BuildResult<(System, GapReport, BuildStats)> {
        if let Some(raw) = datasets.get(names::MODELED_YEARS) {
            // Checked against the configuration before building.
            let years = self.stats.entry(names::MODELED_YEARS);
            years.rows += raw.record_count();
            years.built += raw.record_count();
        }
        if let Some(raw) = datasets.get(names::HIERARCHY) {
            self.add_regions(raw)?;
        }
        let fuels = match datasets.get(names::FUEL_TECH_MAP) {
            Some(raw) => self.fuel_map(raw)?,
            None => BTreeMap::new(),
        };
        if let Some(raw) = datasets.get(names::CAPACITY) {
            self.add_generators(raw, &fuels)?;
        }
        if let Some(raw) = datasets.get(names::TRANSMISSION) {
            self.add_transmission(raw)?;
        }
        if let Some(raw) = datasets.get(names::RESERVES) {
            self.add_reserves(raw)?;
        }
        if let Some(raw) = datasets.get(names::LOAD_PROFILES) {
            self.add_demand(raw)?;
        }
        if let Some(raw) = datasets.get(names::EMISSIONS) {
            self.add_emissions(raw)?;
        }
        if let Some(raw) = datasets.get(names::CF_PROFILES) {
            self.add_capacity_factors(raw)?;
        }
        if let Some(raw) = datasets.get(names::HYDRO_CF) {
            self.add_hydro_profiles(raw)?;
        }
        self.add_reserve_requirements()?;

        self.stats.system = self.system.stats();
        info!(
            regions = self.stats.system.regions,
            generators = self.stats.system.generators,
            links = self.stats.system.links,
            reserves = self.stats.system.reserves,
            demands = self.stats.system.demands,
            emissions = self.stats.system.emissions,
            series = self.stats.system.series,
            shared_slices = self.cache.len(),
            "built system"
        );
        Ok((self.system, self.report, self.stats))
    }

    // =========================================================================
    // Policy
    // =========================================================================

    /// Drops a source record, or aborts under the strict policy.
    fn drop_record(
        &mut self,
        dataset: &str,
        entity: &str,
        line: Option<u64>,
        err: BuildError,
    ) -> BuildResult<()> {
        if self.policy.is_strict() || err.is_always_fatal() {
            return Err(err);
        }
        warn!(dataset, entity, error = %err, "record dropped");
        self.report.add_dropped(dataset, entity, line, &err);
        self.stats.entry(dataset).dropped += 1;
        Ok(())
    }

    /// Records a problem with already built components, or aborts under the
    /// strict policy.
    fn tolerate(&mut self, subjects: &[String], err: BuildError) -> BuildResult<()> {
        if self.policy.is_strict() || err.is_always_fatal() {
            return Err(err);
        }
        for subject in subjects {
            warn!(subject = %subject, error = %err, "gap recorded");
            self.report.add_build_error(subject, &err);
        }
        Ok(())
    }

    fn duplicate(dataset: &str, key: &str, detail: String) -> BuildError {
        BuildError::DuplicateConflict {
            dataset: dataset.to_string(),
            key: key.to_string(),
            detail,
        }
    }

    fn missing_region(&self, dataset: &str, entity: &str, region: &str) -> Option<BuildError> {
        (!self.system.has_region(region)).then(|| BuildError::ReferentialIntegrity {
            dataset: dataset.to_string(),
            entity: entity.to_string(),
            detail: format!("region '{region}' does not exist"),
        })
    }

    // =========================================================================
    // Regions
    // =========================================================================

    fn add_regions(&mut self, raw: &RawDataset) -> BuildResult<()> {
        let name = names::HIERARCHY;
        let mut aggregates: Aggregates = BTreeMap::new();
        let mut areas: BTreeMap<RegionId, HierarchyRow> = BTreeMap::new();

        for table in raw.tables() {
            for row in &table.rows {
                self.stats.entry(name).rows += 1;
                let parsed: HierarchyRow = table.deserialize(name, row)?;
                let id = RegionId::new(parsed.region.trim());

                if let Some(existing) = areas.get(&id) {
                    if *existing == parsed {
                        self.stats.entry(name).merged += 1;
                    } else {
                        let err = Self::duplicate(
                            name,
                            id.as_str(),
                            "hierarchy rows disagree on the region's parents".into(),
                        );
                        self.drop_record(name, id.as_str(), Some(row.line), err)?;
                    }
                    continue;
                }

                let chain = aggregate_chain(&parsed);
                let conflict = hierarchy_conflict(&id, &chain, &aggregates, &areas);
                if let Some(detail) = conflict {
                    let err = BuildError::ReferentialIntegrity {
                        dataset: name.to_string(),
                        entity: id.to_string(),
                        detail,
                    };
                    self.drop_record(name, id.as_str(), Some(row.line), err)?;
                    continue;
                }

                for (level, agg, parent) in chain {
                    aggregates.entry(agg).or_insert((level, parent));
                }
                areas.insert(id, parsed);
                self.stats.entry(name).built += 1;
            }
        }

        // Parents first: coarsest level, then id.
        let mut ordered: Vec<_> = aggregates.into_iter().collect();
        ordered.sort_by(|(a_id, (a_level, _)), (b_id, (b_level, _))| {
            b_level.cmp(a_level).then_with(|| a_id.cmp(b_id))
        });
        for (id, (level, parent)) in ordered {
            let mut region = Region::new(id.as_str(), level);
            if let Some(parent) = parent {
                region = region.with_parent(parent);
            }
            self.system.add_region(region)?;
        }

        for (id, row) in areas {
            let parent = aggregate_chain(&row).pop().map(|(_, agg, _)| agg);
            let attributes = RegionAttributes {
                state: non_empty(row.state.as_deref()).map(str::to_string),
                nerc_region: non_empty(row.nerc_region.as_deref()).map(str::to_string),
                transmission_region: non_empty(row.transmission_region.as_deref())
                    .map(str::to_string),
                interconnect: non_empty(row.interconnect.as_deref()).map(str::to_string),
                country: non_empty(row.country.as_deref()).map(str::to_string),
            };
            let mut region =
                Region::new(id.as_str(), RegionLevel::BalancingArea).with_attributes(attributes);
            if let Some(parent) = parent {
                region = region.with_parent(parent);
            }
            self.system.add_region(region)?;
        }

        info!(
            regions = self.system.stats().regions,
            depth = hierarchy_depth(&self.system),
            "added regions"
        );
        Ok(())
    }

    // =========================================================================
    // Generators
    // =========================================================================

    /// Technology (lowercased) → fuel label.
    fn fuel_map(&mut self, raw: &RawDataset) -> BuildResult<BTreeMap<String, String>> {
        let name = names::FUEL_TECH_MAP;
        let mut fuels: BTreeMap<String, String> = BTreeMap::new();
        for table in raw.tables() {
            for row in &table.rows {
                self.stats.entry(name).rows += 1;
                let parsed: FuelRow = table.deserialize(name, row)?;
                if self.config.is_excluded(&parsed.technology) {
                    self.stats.entry(name).excluded += 1;
                    continue;
                }
                let key = parsed.technology.trim().to_ascii_lowercase();
                match fuels.get(&key) {
                    Some(fuel) if *fuel == parsed.fuel => self.stats.entry(name).merged += 1,
                    Some(fuel) => {
                        let err = Self::duplicate(
                            name,
                            &key,
                            format!("fuel '{fuel}' vs '{}'", parsed.fuel),
                        );
                        self.drop_record(name, &key, Some(row.line), err)?;
                    }
                    None => {
                        fuels.insert(key, parsed.fuel);
                        self.stats.entry(name).built += 1;
                    }
                }
            }
        }
        Ok(fuels)
    }

    /// Vintage-free id for aggregated variable technologies.
    fn generator_id(
        &self,
        technology: &str,
        vintage: Option<&str>,
        region: &RegionId,
    ) -> GeneratorId {
        let aggregated = self
            .rules
            .classify(technology)
            .is_some_and(|c| c.category.is_variable());
        GeneratorId::for_technology(technology, vintage.filter(|_| !aggregated), region)
    }

    fn add_generators(
        &mut self,
        raw: &RawDataset,
        fuels: &BTreeMap<String, String>,
    ) -> BuildResult<()> {
        let name = names::CAPACITY;
        let solve_years: BTreeSet<i32> = self.config.solve_years.iter().copied().collect();
        let mut drafts: BTreeMap<GeneratorId, Generator> = BTreeMap::new();
        // Capacity per vintage behind each (generator, year) total.
        let mut parts: BTreeMap<(GeneratorId, i32), BTreeMap<Option<String>, Megawatts>> =
            BTreeMap::new();

        for table in raw.tables() {
            for row in &table.rows {
                self.stats.entry(name).rows += 1;
                let parsed: CapacityRow = table.deserialize(name, row)?;
                if self.config.is_excluded(&parsed.technology) {
                    self.stats.entry(name).excluded += 1;
                    continue;
                }
                if !solve_years.contains(&parsed.year) {
                    self.stats.entry(name).filtered += 1;
                    continue;
                }

                let region = RegionId::new(parsed.region.as_str());
                let vintage = non_empty(parsed.vintage.as_deref());
                let id = self.generator_id(&parsed.technology, vintage, &region);
                if !parsed.capacity.is_finite() || parsed.capacity < 0.0 {
                    let err = BuildError::OutOfRange {
                        dataset: name.to_string(),
                        entity: id.to_string(),
                        detail: format!(
                            "capacity {} is not a non-negative number",
                            parsed.capacity
                        ),
                    };
                    self.drop_record(name, id.as_str(), Some(row.line), err)?;
                    continue;
                }
                if let Some(err) = self.missing_region(name, id.as_str(), region.as_str()) {
                    self.drop_record(name, id.as_str(), Some(row.line), err)?;
                    continue;
                }

                let capacity = Megawatts(parsed.capacity);
                let vintages = parts.entry((id.clone(), parsed.year)).or_default();
                match vintages.get(&vintage.map(str::to_string)).copied() {
                    Some(previous) if previous == capacity => {
                        self.stats.entry(name).merged += 1;
                        continue;
                    }
                    Some(previous) => {
                        let key = format!("{id}@{}", parsed.year);
                        let err = Self::duplicate(
                            name,
                            &key,
                            format!("capacity {previous} vs {capacity}"),
                        );
                        self.drop_record(name, id.as_str(), Some(row.line), err)?;
                        continue;
                    }
                    None => {
                        vintages.insert(vintage.map(str::to_string), capacity);
                    }
                }
                self.stats.entry(name).built += 1;

                if let Some(existing) = drafts.get_mut(&id) {
                    let total = existing.capacity_by_year.entry(parsed.year).or_default();
                    *total = *total + capacity;
                    continue;
                }

                let classification = match self.rules.classify(&parsed.technology) {
                    Some(classification) => classification,
                    None => {
                        let err = BuildError::UnclassifiedTechnology {
                            dataset: name.to_string(),
                            technology: parsed.technology.clone(),
                        };
                        self.tolerate(&[id.to_string()], err)?;
                        Classification::unclassified(&parsed.technology)
                    }
                };
                let vintage = vintage.filter(|_| !classification.category.is_variable());
                let mut generator = Generator::new(&parsed.technology, vintage, region)
                    .with_category(classification.category, &classification.subtype);
                generator.capacity_by_year.insert(parsed.year, capacity);
                generator.fuel_type = fuels
                    .get(&parsed.technology.trim().to_ascii_lowercase())
                    .cloned();
                drafts.insert(id, generator);
            }
        }

        let primary = self.config.primary_solve_year();
        let aggregated = drafts.values().filter(|g| g.is_variable()).count();
        for (_, mut generator) in drafts {
            generator.capacity = primary
                .and_then(|year| generator.capacity_by_year.get(&year).copied())
                .unwrap_or_default();
            self.system.add_generator(generator)?;
        }
        info!(
            generators = self.system.stats().generators,
            aggregated, "added generators"
        );
        Ok(())
    }

    // =========================================================================
    // Transmission
    // =========================================================================

    fn add_transmission(&mut self, raw: &RawDataset) -> BuildResult<()> {
        let name = names::TRANSMISSION;
        let primary = self.config.primary_solve_year();
        let mut corridors: BTreeMap<(RegionId, RegionId, Option<String>), Corridor> =
            BTreeMap::new();

        for table in raw.tables() {
            for row in &table.rows {
                self.stats.entry(name).rows += 1;
                let parsed: TransmissionRow = table.deserialize(name, row)?;
                let from = RegionId::new(parsed.from_region.as_str());
                let to = RegionId::new(parsed.to_region.as_str());
                let kind = non_empty(parsed.kind.as_deref()).map(str::to_string);
                let entity = LinkId::between(&from, &to, kind.as_deref()).to_string();
                // Fatal whatever year the row carries.
                if from == to {
                    return Err(BuildError::ReferentialIntegrity {
                        dataset: name.to_string(),
                        entity,
                        detail: format!("link connects region '{from}' to itself"),
                    });
                }
                if parsed.year.is_some() && parsed.year != primary {
                    self.stats.entry(name).filtered += 1;
                    continue;
                }
                if !parsed.capacity.is_finite() || parsed.capacity < 0.0 {
                    let err = BuildError::OutOfRange {
                        dataset: name.to_string(),
                        entity: entity.clone(),
                        detail: format!(
                            "capacity {} is not a non-negative number",
                            parsed.capacity
                        ),
                    };
                    self.drop_record(name, &entity, Some(row.line), err)?;
                    continue;
                }
                let missing = self
                    .missing_region(name, &entity, from.as_str())
                    .or_else(|| self.missing_region(name, &entity, to.as_str()));
                if let Some(err) = missing {
                    self.drop_record(name, &entity, Some(row.line), err)?;
                    continue;
                }

                let capacity = Megawatts(parsed.capacity);
                let forward = from < to;
                let key = if forward {
                    (from, to, kind)
                } else {
                    (to, from, kind)
                };
                let corridor = corridors.entry(key).or_default();
                let slot = if forward {
                    &mut corridor.forward
                } else {
                    &mut corridor.reverse
                };
                let previous = *slot;
                match previous {
                    Some(previous) if previous == capacity => self.stats.entry(name).merged += 1,
                    Some(previous) => {
                        let err = Self::duplicate(
                            name,
                            &entity,
                            format!("capacity {previous} vs {capacity}"),
                        );
                        self.drop_record(name, &entity, Some(row.line), err)?;
                    }
                    None => {
                        *slot = Some(capacity);
                        self.stats.entry(name).built += 1;
                    }
                }
            }
        }

        for ((from, to, kind), corridor) in corridors {
            // A corridor listed in one direction only is symmetric.
            let forward = corridor.forward.or(corridor.reverse).unwrap_or_default();
            let reverse = corridor.reverse.or(corridor.forward).unwrap_or_default();
            self.system.add_link(TransmissionLink::new(
                from.as_str(),
                to.as_str(),
                kind.as_deref(),
                forward,
                reverse,
            ))?;
        }
        info!(links = self.system.stats().links, "added transmission links");
        Ok(())
    }

    // =========================================================================
    // Reserves and demand
    // =========================================================================

    fn add_reserves(&mut self, raw: &RawDataset) -> BuildResult<()> {
        let name = names::RESERVES;
        let mut reserves: BTreeMap<ReserveId, Reserve> = BTreeMap::new();

        for table in raw.tables() {
            for row in &table.rows {
                self.stats.entry(name).rows += 1;
                let parsed: ReserveRow = table.deserialize(name, row)?;
                let entity = parsed.region.clone();

                let kind = match ReserveType::parse(&parsed.reserve_type) {
                    Ok(kind) => kind,
                    Err(err) => {
                        self.drop_record(name, &entity, Some(row.line), err)?;
                        continue;
                    }
                };
                let direction = match non_empty(parsed.direction.as_deref()) {
                    None => ReserveDirection::Up,
                    Some(raw_direction) => match ReserveDirection::parse(raw_direction) {
                        Ok(direction) => direction,
                        Err(err) => {
                            self.drop_record(name, &entity, Some(row.line), err)?;
                            continue;
                        }
                    },
                };

                let region = RegionId::new(parsed.region.as_str());
                let id = ReserveId::for_region(&region, kind, direction);
                if let Some(err) = self.missing_region(name, id.as_str(), region.as_str()) {
                    self.drop_record(name, id.as_str(), Some(row.line), err)?;
                    continue;
                }
                let requirement = match parsed.requirement {
                    None => ReserveRequirement::TimeVarying,
                    Some(value) if value.is_finite() && value >= 0.0 => {
                        ReserveRequirement::Constant(Megawatts(value))
                    }
                    Some(value) => {
                        let err = BuildError::OutOfRange {
                            dataset: name.to_string(),
                            entity: id.to_string(),
                            detail: format!("requirement {value} is not a non-negative number"),
                        };
                        self.drop_record(name, id.as_str(), Some(row.line), err)?;
                        continue;
                    }
                };

                let reserve = Reserve::new(region, kind, direction, requirement);
                match reserves.get(&id) {
                    Some(existing) if *existing == reserve => self.stats.entry(name).merged += 1,
                    Some(existing) => {
                        let err = Self::duplicate(
                            name,
                            id.as_str(),
                            format!(
                                "requirement {:?} vs {:?}",
                                existing.requirement, reserve.requirement
                            ),
                        );
                        self.drop_record(name, id.as_str(), Some(row.line), err)?;
                    }
                    None => {
                        reserves.insert(id, reserve);
                        self.stats.entry(name).built += 1;
                    }
                }
            }
        }

        for reserve in reserves.into_values() {
            self.system.add_reserve(reserve)?;
        }
        info!(reserves = self.system.stats().reserves, "added reserves");
        Ok(())
    }

    fn add_demand(&mut self, raw: &RawDataset) -> BuildResult<()> {
        let name = names::LOAD_PROFILES;
        let calendar = self.config.calendar;
        let pairs = self.config.year_pairs();
        let labels: BTreeSet<String> = raw
            .arrays()
            .iter()
            .flat_map(|table| table.labels())
            .map(str::to_string)
            .collect();
        self.stats.entry(name).rows += labels.len();

        for label in labels {
            if let Some(err) = self.missing_region(name, &label, &label) {
                self.drop_record(name, &label, None, err)?;
                continue;
            }
            let demand = DemandProfile::new(RegionId::new(label.as_str()));
            let owner = demand.id.to_string();
            self.system.add_demand(demand)?;
            self.stats.entry(name).built += 1;

            for (solve_year, weather_year) in &pairs {
                let series = self.cache.series(
                    raw,
                    &label,
                    LOAD_SERIES,
                    &owner,
                    Some(*solve_year),
                    *weather_year,
                    &calendar,
                );
                match series {
                    Ok(Some(series)) => self.system.attach_series(&owner, series)?,
                    Ok(None) => {}
                    Err(err) => self.tolerate(&[owner.clone()], err)?,
                }
            }
        }
        info!(demands = self.system.stats().demands, "added demand profiles");
        Ok(())
    }

    // =========================================================================
    // Emissions
    // =========================================================================

    fn add_emissions(&mut self, raw: &RawDataset) -> BuildResult<()> {
        let name = names::EMISSIONS;
        let mut records: BTreeMap<(GeneratorId, EmissionType, EmissionSource), EmissionRecord> =
            BTreeMap::new();

        for table in raw.tables() {
            for row in &table.rows {
                self.stats.entry(name).rows += 1;
                let parsed: EmissionRow = table.deserialize(name, row)?;
                if self.config.is_excluded(&parsed.technology) {
                    self.stats.entry(name).excluded += 1;
                    continue;
                }

                let generator = self.generator_id(
                    &parsed.technology,
                    non_empty(parsed.vintage.as_deref()),
                    &RegionId::new(parsed.region.as_str()),
                );
                let entity = generator.to_string();
                if !self.system.has_generator(generator.as_str()) {
                    let err = BuildError::ReferentialIntegrity {
                        dataset: name.to_string(),
                        entity: entity.clone(),
                        detail: format!("generator '{generator}' does not exist"),
                    };
                    self.drop_record(name, &entity, Some(row.line), err)?;
                    continue;
                }
                let parsed_kinds = EmissionType::parse(&parsed.pollutant).and_then(|pollutant| {
                    EmissionSource::parse(parsed.source.as_deref())
                        .map(|source| (pollutant, source))
                });
                let (pollutant, source) = match parsed_kinds {
                    Ok(kinds) => kinds,
                    Err(err) => {
                        self.drop_record(name, &entity, Some(row.line), err)?;
                        continue;
                    }
                };
                // Negative rates are legitimate for carbon-removal technologies.
                if !parsed.rate.is_finite() {
                    let err = BuildError::OutOfRange {
                        dataset: name.to_string(),
                        entity: entity.clone(),
                        detail: format!("emission rate {} is not finite", parsed.rate),
                    };
                    self.drop_record(name, &entity, Some(row.line), err)?;
                    continue;
                }

                let record = EmissionRecord {
                    generator: generator.clone(),
                    pollutant,
                    source,
                    rate: TonnesPerMwh(parsed.rate),
                };
                let key = (generator, pollutant, source);
                match records.get(&key) {
                    Some(existing) if *existing == record => self.stats.entry(name).merged += 1,
                    Some(existing) => {
                        let err = Self::duplicate(
                            name,
                            &format!("{entity}/{pollutant}"),
                            format!("rate {} vs {}", existing.rate, record.rate),
                        );
                        self.drop_record(name, &entity, Some(row.line), err)?;
                    }
                    None => {
                        records.insert(key, record);
                        self.stats.entry(name).built += 1;
                    }
                }
            }
        }

        for record in records.into_values() {
            self.system.add_emission(record)?;
        }
        info!(emissions = self.system.stats().emissions, "added emission records");
        Ok(())
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    /// Generators of `technology` in `region`; only hydro units when
    /// `hydro_only` is set.
    fn generators_for(&self, technology: &str, region: &str, hydro_only: bool) -> Vec<String> {
        self.system
            .generators_in(region)
            .filter(|g| g.technology.eq_ignore_ascii_case(technology))
            .filter(|g| !hydro_only || g.category.is_hydro())
            .map(|g| g.id.to_string())
            .collect()
    }

    /// Binds `technology|region` columns to every matching generator.
    fn add_capacity_factors(&mut self, raw: &RawDataset) -> BuildResult<()> {
        let name = names::CF_PROFILES;
        let calendar = self.config.calendar;
        let pairs = self.config.year_pairs();
        let labels: BTreeSet<String> = raw
            .arrays()
            .iter()
            .flat_map(|table| table.labels())
            .map(str::to_string)
            .collect();
        self.stats.entry(name).rows += labels.len();

        for label in labels {
            let Some((technology, region)) = label.split_once('|') else {
                let err = BuildError::InvalidValue {
                    field: "profile label",
                    value: label.clone(),
                };
                self.drop_record(name, &label, None, err)?;
                continue;
            };
            if self.config.is_excluded(technology) {
                self.stats.entry(name).excluded += 1;
                continue;
            }
            if let Some(err) = self.missing_region(name, &label, region) {
                self.drop_record(name, &label, None, err)?;
                continue;
            }
            let owners = self.generators_for(technology, region, false);
            let Some(first) = owners.first().cloned() else {
                self.stats.entry(name).filtered += 1;
                continue;
            };
            self.stats.entry(name).built += 1;

            for (solve_year, weather_year) in &pairs {
                let series = self.cache.series(
                    raw,
                    &label,
                    CAPACITY_FACTOR_SERIES,
                    &first,
                    Some(*solve_year),
                    *weather_year,
                    &calendar,
                );
                match series {
                    Ok(Some(series)) => {
                        for owner in &owners {
                            self.system.attach_series(owner, series.clone())?;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => self.tolerate(&owners, err)?,
                }
            }
        }

        Ok(())
    }

    /// Expands monthly hydro capacity factors to full-year profiles.
    fn add_hydro_profiles(&mut self, raw: &RawDataset) -> BuildResult<()> {
        let name = names::HYDRO_CF;
        let calendar = self.config.calendar;
        let mut groups: BTreeMap<(String, String), [Option<f64>; 12]> = BTreeMap::new();

        for table in raw.tables() {
            for row in &table.rows {
                self.stats.entry(name).rows += 1;
                let parsed: HydroRow = table.deserialize(name, row)?;
                if self.config.is_excluded(&parsed.technology) {
                    self.stats.entry(name).excluded += 1;
                    continue;
                }
                let entity = format!("{}|{}", parsed.technology, parsed.region);
                if let Some(err) = self.missing_region(name, &entity, &parsed.region) {
                    self.drop_record(name, &entity, Some(row.line), err)?;
                    continue;
                }
                if self
                    .generators_for(&parsed.technology, &parsed.region, true)
                    .is_empty()
                {
                    self.stats.entry(name).filtered += 1;
                    continue;
                }
                if !(1..=12).contains(&parsed.month)
                    || !parsed.value.is_finite()
                    || parsed.value < 0.0
                {
                    let err = BuildError::OutOfRange {
                        dataset: name.to_string(),
                        entity: entity.clone(),
                        detail: format!(
                            "month {} value {} is not a valid monthly capacity factor",
                            parsed.month, parsed.value
                        ),
                    };
                    self.drop_record(name, &entity, Some(row.line), err)?;
                    continue;
                }

                let key = (parsed.technology.to_ascii_lowercase(), parsed.region.clone());
                let slot = &mut groups.entry(key).or_insert([None; 12])[parsed.month as usize - 1];
                let previous = *slot;
                match previous {
                    Some(previous) if previous == parsed.value => {
                        self.stats.entry(name).merged += 1
                    }
                    Some(previous) => {
                        let err = Self::duplicate(
                            name,
                            &format!("{entity}@{}", parsed.month),
                            format!("value {previous} vs {}", parsed.value),
                        );
                        self.drop_record(name, &entity, Some(row.line), err)?;
                    }
                    None => {
                        *slot = Some(parsed.value);
                        self.stats.entry(name).built += 1;
                    }
                }
            }
        }

        let weather_years: BTreeSet<i32> = self.config.weather_years.iter().copied().collect();
        for ((technology, region), months) in groups {
            let owners = self.generators_for(&technology, &region, true);
            let Some(first) = owners.first().cloned() else {
                continue;
            };
            let monthly: Vec<f64> = months.iter().flatten().copied().collect();
            for weather_year in &weather_years {
                let series = monthly_to_hourly(*weather_year, &monthly, &calendar)
                    .map_err(|e| BuildError::OutOfRange {
                        dataset: name.to_string(),
                        entity: format!("{technology}|{region}"),
                        detail: e.to_string(),
                    })
                    .and_then(|hourly| {
                        align_values(
                            name,
                            &first,
                            CAPACITY_FACTOR_SERIES,
                            hourly.into(),
                            None,
                            *weather_year,
                            &calendar,
                        )
                    });
                match series {
                    Ok(series) => {
                        for owner in &owners {
                            self.system.attach_series(owner, series.clone())?;
                        }
                    }
                    Err(err) => self.tolerate(&owners, err)?,
                }
            }
        }
        Ok(())
    }

    /// Derives hourly requirements for reserves without a constant one from
    /// the load, wind and solar profiles of the reserve's region and every
    /// region below it.
    fn add_reserve_requirements(&mut self) -> BuildResult<()> {
        let calendar = self.config.calendar;
        let pending: Vec<(String, RegionId, ReserveType)> = self
            .system
            .reserves()
            .filter(|r| r.requirement == ReserveRequirement::TimeVarying)
            .map(|r| (r.id.to_string(), r.region.clone(), r.kind))
            .collect();

        for (id, region, kind) in pending {
            let fractions = self.config.fractions_for(kind);
            let members: Vec<RegionId> = self
                .system
                .regions()
                .filter(|r| {
                    r.id == region
                        || region_ancestors(&self.system, r.id.as_str()).contains(&region)
                })
                .map(|r| r.id.clone())
                .collect();

            for (solve_year, weather_year) in self.config.year_pairs() {
                let requirement = {
                    let system = &self.system;
                    let mut wind = Vec::new();
                    let mut solar = Vec::new();
                    let mut loads: Vec<&[f64]> = Vec::new();
                    for member in &members {
                        for generator in system.generators_in(member.as_str()) {
                            if !generator.is_variable() {
                                continue;
                            }
                            let profile = system
                                .time_series(generator.id.as_str())
                                .iter()
                                .find(|ts| {
                                    ts.name == CAPACITY_FACTOR_SERIES
                                        && ts.weather_year == weather_year
                                        && ts.solve_year.map_or(true, |s| s == solve_year)
                                });
                            if let Some(ts) = profile {
                                let unit = CapacityProfile {
                                    capacity_mw: generator.capacity.value(),
                                    profile: &ts.values[..],
                                };
                                if generator.category == TechnologyCategory::Wind {
                                    wind.push(unit);
                                } else {
                                    solar.push(unit);
                                }
                            }
                        }
                        let demand = DemandId::for_region(member);
                        if let Some(ts) = system.time_series(demand.as_str()).iter().find(|ts| {
                            ts.weather_year == weather_year && ts.solve_year == Some(solve_year)
                        }) {
                            loads.push(&ts.values[..]);
                        }
                    }
                    reserve_requirement(&wind, &solar, &loads, &fractions)
                };

                let series = requirement
                    .map_err(|e| BuildError::OutOfRange {
                        dataset: names::RESERVES.to_string(),
                        entity: id.clone(),
                        detail: e.to_string(),
                    })
                    .and_then(|values| {
                        align_values(
                            names::RESERVES,
                            &id,
                            REQUIREMENT_SERIES,
                            values.into(),
                            Some(solve_year),
                            weather_year,
                            &calendar,
                        )
                    });
                match series {
                    Ok(series) => self.system.attach_series(&id, series)?,
                    Err(err) => self.tolerate(&[id.clone()], err)?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::YearBinding;
    use crate::readers::{ArrayTable, RawData, TableRow, TableSource};
    use csv::StringRecord;
    use gridplan_core::ErrorKind;
    use std::sync::Arc;

    fn table(headers: &[&str], rows: &[&[&str]]) -> TableSource {
        TableSource {
            path: "fixture.csv".into(),
            binding: YearBinding::default(),
            headers: StringRecord::from(headers.to_vec()),
            rows: rows
                .iter()
                .enumerate()
                .map(|(i, cells)| TableRow {
                    line: i as u64 + 2,
                    record: StringRecord::from(cells.to_vec()),
                })
                .collect(),
        }
    }

    fn raw(name: &str, source: TableSource) -> RawDataset {
        RawDataset {
            name: name.into(),
            data: RawData::Table(vec![source]),
        }
    }

    fn hierarchy() -> RawDataset {
        raw(
            names::HIERARCHY,
            table(
                &["region", "transmission_region", "interconnect", "country"],
                &[
                    &["p1", "west", "wecc", "usa"],
                    &["p2", "west", "wecc", "usa"],
                    &["p3", "texas", "ercot", "usa"],
                ],
            ),
        )
    }

    fn capacity(rows: &[&[&str]]) -> RawDataset {
        raw(
            names::CAPACITY,
            table(&["technology", "vintage", "region", "year", "capacity"], rows),
        )
    }

    fn load(labels: &[&str]) -> RawDataset {
        RawDataset {
            name: names::LOAD_PROFILES.into(),
            data: RawData::Array(vec![ArrayTable {
                path: "load.arrow".into(),
                binding: YearBinding::default(),
                dims: vec!["hour".into(), "region".into()],
                solve_years: None,
                weather_years: None,
                columns: labels
                    .iter()
                    .map(|l| (l.to_string(), Arc::from(vec![100.0; 8760])))
                    .collect(),
                rows: 8760,
            }]),
        }
    }

    fn build(
        config: &BuildConfig,
        datasets: Vec<RawDataset>,
    ) -> BuildResult<(System, GapReport, BuildStats)> {
        let rules = RuleSet::from_config(config).unwrap();
        let map = datasets.into_iter().map(|d| (d.name.clone(), d)).collect();
        SystemBuilder::new(config, &rules, GapReport::new()).build(&map)
    }

    fn config() -> BuildConfig {
        BuildConfig::new(vec![2030], vec![2012])
    }

    #[test]
    fn hierarchy_builds_parent_chain() {
        let (system, report, stats) = build(&config(), vec![hierarchy()]).unwrap();
        assert!(report.is_empty());
        assert_eq!(system.stats().regions, 3 + 2 + 2 + 1);
        assert_eq!(
            region_ancestors(&system, "p1"),
            vec![RegionId::new("west"), RegionId::new("wecc"), RegionId::new("usa")]
        );
        let p3 = system.region("p3").unwrap();
        assert_eq!(p3.attributes.interconnect.as_deref(), Some("ercot"));
        assert!(stats.dataset(names::HIERARCHY).unwrap().is_reconciled());
    }

    #[test]
    fn conflicting_parent_is_dropped_when_tolerant() {
        let bad = raw(
            names::HIERARCHY,
            table(
                &["region", "transmission_region", "interconnect", "country"],
                &[&["p1", "west", "wecc", "usa"], &["p2", "west", "eastern", "usa"]],
            ),
        );
        let strict = build(&config(), vec![bad.clone()]).unwrap_err();
        assert_eq!(strict.kind(), ErrorKind::ReferentialIntegrity);

        let (system, report, stats) = build(&config().with_strict(false), vec![bad]).unwrap();
        assert!(!system.has_region("p2"));
        assert_eq!(report.dropped_in(names::HIERARCHY), 1);
        assert_eq!(stats.dataset(names::HIERARCHY).unwrap().dropped, 1);
    }

    #[test]
    fn capacity_rows_accounted() {
        let config = config().with_excluded_techs(&["can-imports"]);
        let rows: &[&[&str]] = &[
            &["gas-cc", "new", "p1", "2030", "400"],
            &["gas-cc", "new", "p1", "2030", "400"],
            &["gas-cc", "new", "p1", "2040", "500"],
            &["can-imports", "", "p1", "2030", "10"],
            &["upv_1", "", "p2", "2030", "50"],
        ];
        let (system, _, stats) = build(&config, vec![hierarchy(), capacity(rows)]).unwrap();
        let cap = stats.dataset(names::CAPACITY).unwrap();
        assert_eq!((cap.rows, cap.built, cap.merged, cap.excluded, cap.filtered), (5, 2, 1, 1, 1));
        assert!(cap.is_reconciled());

        let gas = system.generator("gas-cc_new_p1").unwrap();
        assert_eq!(gas.capacity, Megawatts(400.0));
        assert_eq!(gas.category, TechnologyCategory::Thermal);
        assert!(system.generator("upv_1_p2").unwrap().is_variable());
    }

    #[test]
    fn unclassified_technology_follows_policy() {
        let rows: &[&[&str]] = &[&["FutureFusion-9000", "", "p1", "2030", "1"]];
        let err = build(&config(), vec![hierarchy(), capacity(rows)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnclassifiedTechnology);

        let (system, report, _) =
            build(&config().with_strict(false), vec![hierarchy(), capacity(rows)]).unwrap();
        let generator = system.generator("FutureFusion-9000_p1").unwrap();
        assert_eq!(generator.category, TechnologyCategory::Unclassified);
        assert!(report.contains(ErrorKind::UnclassifiedTechnology, "FutureFusion-9000_p1"));
        assert_eq!(report.dropped_in(names::CAPACITY), 0);
    }

    #[test]
    fn conflicting_capacity_keeps_first_row() {
        let rows: &[&[&str]] = &[
            &["gas-cc", "new", "p1", "2030", "400"],
            &["gas-cc", "new", "p1", "2030", "450"],
        ];
        let err = build(&config(), vec![hierarchy(), capacity(rows)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateConflict);

        let (system, report, _) =
            build(&config().with_strict(false), vec![hierarchy(), capacity(rows)]).unwrap();
        assert_eq!(system.generator("gas-cc_new_p1").unwrap().capacity, Megawatts(400.0));
        assert_eq!(report.by_kind(ErrorKind::DuplicateConflict).count(), 1);
    }

    #[test]
    fn directional_rows_merge_into_one_link() {
        let tx = raw(
            names::TRANSMISSION,
            table(
                &["from_region", "to_region", "kind", "capacity"],
                &[
                    &["p2", "p1", "ac", "80"],
                    &["p1", "p2", "ac", "100"],
                    &["p1", "p3", "dc", "20"],
                ],
            ),
        );
        let (system, _, stats) = build(&config(), vec![hierarchy(), tx]).unwrap();
        let ac = system.link("p1||p2_ac").unwrap();
        assert_eq!(ac.forward_capacity, Megawatts(100.0));
        assert_eq!(ac.reverse_capacity, Megawatts(80.0));
        let dc = system.link("p1||p3_dc").unwrap();
        assert_eq!(dc.reverse_capacity, Megawatts(20.0));
        assert_eq!(stats.dataset(names::TRANSMISSION).unwrap().built, 3);
    }

    #[test]
    fn self_link_fails_in_both_modes() {
        let tx = raw(
            names::TRANSMISSION,
            table(&["from_region", "to_region", "capacity"], &[&["p1", "p1", "10"]]),
        );
        for strict in [true, false] {
            let err =
                build(&config().with_strict(strict), vec![hierarchy(), tx.clone()]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ReferentialIntegrity);
        }
    }

    #[test]
    fn demand_series_bound_per_year_pair() {
        let config = BuildConfig::new(vec![2030, 2035], vec![2012]);
        let (system, _, _) = build(&config, vec![hierarchy(), load(&["p1", "p2"])]).unwrap();
        let series = system.time_series("p1_load");
        assert_eq!(series.len(), 2);
        assert!(Arc::ptr_eq(&series[0].values, &series[1].values));
        assert_eq!(series[1].solve_year, Some(2035));
    }

    #[test]
    fn orphan_load_column_dropped_when_tolerant() {
        let (system, report, stats) = build(
            &config().with_strict(false),
            vec![hierarchy(), load(&["p1", "p99"])],
        )
        .unwrap();
        assert!(system.demand("p1_load").is_some());
        assert!(system.demand("p99_load").is_none());
        assert_eq!(report.dropped_in(names::LOAD_PROFILES), 1);
        assert!(stats.dataset(names::LOAD_PROFILES).unwrap().is_reconciled());
    }

    #[test]
    fn reserve_without_requirement_is_derived_from_load() {
        let reserves = raw(
            names::RESERVES,
            table(
                &["region", "reserve_type", "requirement"],
                &[&["west", "regulation", ""], &["p3", "SPINNING", "25"]],
            ),
        );
        let (system, _, _) =
            build(&config(), vec![hierarchy(), load(&["p1", "p2", "p3"]), reserves]).unwrap();

        let regulation = system.reserve("west_REGULATION").unwrap();
        assert_eq!(regulation.requirement, ReserveRequirement::TimeVarying);
        let series = &system.time_series("west_REGULATION")[0];
        // default regulation share of load is 1% of p1 + p2
        assert!((series.values[0] - 2.0).abs() < 1e-9);

        let spinning = system.reserve("p3_SPINNING").unwrap();
        assert_eq!(spinning.requirement, ReserveRequirement::Constant(Megawatts(25.0)));
        assert!(system.time_series("p3_SPINNING").is_empty());
    }

    #[test]
    fn unknown_reserve_type_is_dropped_when_tolerant() {
        let reserves = raw(
            names::RESERVES,
            table(&["region", "reserve_type", "requirement"], &[&["p1", "spinning_reserve", "5"]]),
        );
        let (system, report, _) =
            build(&config().with_strict(false), vec![hierarchy(), reserves]).unwrap();
        assert_eq!(system.stats().reserves, 0);
        assert_eq!(report.by_kind(ErrorKind::InvalidValue).count(), 1);
    }

    #[test]
    fn emissions_join_generators() {
        let emissions = raw(
            names::EMISSIONS,
            table(
                &["technology", "vintage", "region", "pollutant", "source", "rate"],
                &[
                    &["gas-cc", "new", "p1", "co2", "", "0.4"],
                    &["gas-cc", "new", "p1", "CO2", "process", "0.05"],
                    &["gas-cc", "new", "p9", "CO2", "", "0.4"],
                ],
            ),
        );
        let rows: &[&[&str]] = &[&["gas-cc", "new", "p1", "2030", "400"]];
        let (system, report, _) = build(
            &config().with_strict(false),
            vec![hierarchy(), capacity(rows), emissions],
        )
        .unwrap();
        let records: Vec<_> = system.emissions_for("gas-cc_new_p1").collect();
        assert_eq!(records.len(), 2);
        assert!(records.iter().any(|r| r.source == EmissionSource::Precombustion));
        assert_eq!(report.dropped_in(names::EMISSIONS), 1);
    }

    #[test]
    fn hydro_months_expand_to_full_year() {
        let mut rows: Vec<Vec<String>> = Vec::new();
        for month in 1..=12 {
            rows.push(vec!["hydend".into(), "p1".into(), month.to_string(), "0.5".into()]);
        }
        let rows_ref: Vec<Vec<&str>> = rows
            .iter()
            .map(|r| r.iter().map(String::as_str).collect())
            .collect();
        let slices: Vec<&[&str]> = rows_ref.iter().map(Vec::as_slice).collect();
        let hydro = raw(
            names::HYDRO_CF,
            table(&["technology", "region", "month", "value"], &slices),
        );
        let cap: &[&[&str]] = &[&["hydend", "", "p1", "2030", "100"]];
        let (system, _, stats) = build(&config(), vec![hierarchy(), capacity(cap), hydro]).unwrap();
        let series = &system.time_series("hydend_p1")[0];
        assert_eq!(series.len(), 8760);
        assert_eq!(series.values[0], 0.5);
        assert_eq!(stats.dataset(names::HYDRO_CF).unwrap().built, 12);
    }

    fn profiles(labels: &[&str]) -> RawDataset {
        RawDataset {
            name: names::CF_PROFILES.into(),
            data: RawData::Array(vec![ArrayTable {
                path: "recf.arrow".into(),
                binding: YearBinding::default(),
                dims: vec!["hour".into(), "resource".into()],
                solve_years: None,
                weather_years: None,
                columns: labels
                    .iter()
                    .map(|l| (l.to_string(), Arc::from(vec![0.25; 8760])))
                    .collect(),
                rows: 8760,
            }]),
        }
    }

    #[test]
    fn region_id_reused_across_levels_is_dropped_when_tolerant() {
        let headers = ["region", "transmission_region", "interconnect", "country"];
        let aggregate_first = raw(
            names::HIERARCHY,
            table(&headers, &[&["p1", "west", "wecc", "usa"], &["west", "", "wecc", "usa"]]),
        );
        let area_first = raw(
            names::HIERARCHY,
            table(&headers, &[&["west", "", "wecc", "usa"], &["p1", "west", "wecc", "usa"]]),
        );

        for rows in [aggregate_first, area_first] {
            let err = build(&config(), vec![rows.clone()]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ReferentialIntegrity);

            let (system, report, stats) =
                build(&config().with_strict(false), vec![rows]).unwrap();
            assert!(system.has_region("west"));
            assert_eq!(report.dropped_in(names::HIERARCHY), 1);
            let hierarchy = stats.dataset(names::HIERARCHY).unwrap();
            assert_eq!((hierarchy.built, hierarchy.dropped), (1, 1));
        }
    }

    #[test]
    fn self_link_outside_solve_year_is_still_fatal() {
        let tx = raw(
            names::TRANSMISSION,
            table(
                &["from_region", "to_region", "year", "capacity"],
                &[&["p1", "p1", "2040", "10"]],
            ),
        );
        let err = build(&config().with_strict(false), vec![hierarchy(), tx]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferentialIntegrity);
        assert!(err.to_string().contains("p1||p1"));
    }

    #[test]
    fn orphan_profile_references_are_dropped_when_tolerant() {
        let cap: &[&[&str]] = &[
            &["upv_1", "", "p2", "2030", "50"],
            &["hydend", "", "p1", "2030", "100"],
        ];
        let hydro = raw(
            names::HYDRO_CF,
            table(
                &["technology", "region", "month", "value"],
                &[&["hydend", "p1", "1", "0.5"], &["hydend", "p99", "1", "0.5"]],
            ),
        );
        let datasets = || {
            vec![
                hierarchy(),
                capacity(cap),
                profiles(&["upv_1|p2", "upv_1|p99", "wind-ons_1|p3"]),
                hydro.clone(),
            ]
        };

        let err = build(&config(), datasets()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferentialIntegrity);

        let (system, report, stats) = build(&config().with_strict(false), datasets()).unwrap();
        assert_eq!(system.time_series("upv_1_p2").len(), 1);
        assert_eq!(report.dropped_in(names::CF_PROFILES), 1);
        assert_eq!(report.dropped_in(names::HYDRO_CF), 1);
        assert!(report.mentions("upv_1|p99"));

        let cf = stats.dataset(names::CF_PROFILES).unwrap();
        // p3 exists but has no wind-ons_1 generator
        assert_eq!((cf.built, cf.filtered, cf.dropped), (1, 1, 1));
        assert!(cf.is_reconciled());
        assert!(stats.dataset(names::HYDRO_CF).unwrap().is_reconciled());
    }

    #[test]
    fn variable_vintages_aggregate_per_region() {
        let rows: &[&[&str]] = &[
            &["upv_1", "2020", "p2", "2030", "30"],
            &["upv_1", "2025", "p2", "2030", "20"],
            &["upv_1", "2025", "p2", "2030", "20"],
            &["upv_1", "2025", "p2", "2030", "25"],
            &["gas-cc", "a", "p1", "2030", "100"],
            &["gas-cc", "b", "p1", "2030", "200"],
        ];
        let err = build(&config(), vec![hierarchy(), capacity(rows)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateConflict);

        let (system, report, stats) =
            build(&config().with_strict(false), vec![hierarchy(), capacity(rows)]).unwrap();
        let solar = system.generator("upv_1_p2").unwrap();
        assert_eq!(solar.capacity, Megawatts(50.0));
        assert!(solar.vintage.is_none());
        assert!(system.generator("gas-cc_a_p1").is_some());
        assert!(system.generator("gas-cc_b_p1").is_some());
        assert_eq!(system.stats().generators, 3);

        assert_eq!(report.dropped_in(names::CAPACITY), 1);
        let cap = stats.dataset(names::CAPACITY).unwrap();
        assert_eq!((cap.built, cap.merged, cap.dropped), (4, 1, 1));
    }
}
