//! # gridplan-core: planning-model component graph
//!
//! Data structures for the output of a capacity-expansion planning run:
//! regions, generators, transmission links, reserves, demand and emissions,
//! plus the hourly time series bound to them.
//!
//! ## Design
//!
//! A [`System`] is a **directed graph** where:
//! - **Nodes**: regions, generators, reserves, demand profiles
//! - **Edges**: parent links (child region → parent region), location links
//!   (component → owning region) and transmission corridors (from → to)
//!
//! Insertion methods check referential invariants as they go: a generator can
//! only be added once its region exists, a link needs two distinct existing
//! endpoints, and a region's parent must already be present at a coarser
//! level. Queries iterate in identifier order so two builds from the same
//! inputs are indistinguishable.
//!
//! ```
//! use gridplan_core::*;
//!
//! let mut system = System::new();
//! system.add_region(Region::new("p1", RegionLevel::BalancingArea)).unwrap();
//! system.add_region(Region::new("p2", RegionLevel::BalancingArea)).unwrap();
//!
//! let gen = Generator::new("gas-cc", Some("new"), RegionId::new("p1"))
//!     .with_category(TechnologyCategory::Thermal, "gas-cc")
//!     .with_capacity(Megawatts(400.0));
//! assert_eq!(gen.id.as_str(), "gas-cc_new_p1");
//! system.add_generator(gen).unwrap();
//!
//! system
//!     .add_link(TransmissionLink::new("p1", "p2", None, Megawatts(100.0), Megawatts(80.0)))
//!     .unwrap();
//! assert_eq!(system.stats().links, 1);
//! ```
//!
//! ## Modules
//!
//! - [`diagnostics`] - Gap report returned by tolerant builds
//! - [`error`] - Build error taxonomy
//! - [`graph_utils`] - Region hierarchy queries and checks
//! - [`kinds`] - Technology, reserve and emission vocabularies
//! - [`units`] - Unit-safe quantities

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDateTime};
use petgraph::graph::{DiGraph, EdgeIndex};
use serde::{Deserialize, Serialize};

pub mod diagnostics;
pub mod error;
pub mod graph_utils;
pub mod kinds;
pub mod units;

pub use diagnostics::{GapEntry, GapReport, Severity};
pub use error::{BuildError, BuildResult, ErrorKind};
pub use graph_utils::*;
pub use kinds::{EmissionSource, EmissionType, ReserveDirection, ReserveType, TechnologyCategory};
pub use petgraph::graph::NodeIndex;
pub use units::{Megawatts, TonnesPerMwh};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(RegionId);
string_id!(
    /// `{technology}_{vintage}_{region}`, or `{technology}_{region}` without a vintage
    GeneratorId
);
string_id!(
    /// `{from}||{to}`, suffixed with `_{kind}` when the corridor has a type
    LinkId
);
string_id!(
    /// `{region}_{TYPE}`, suffixed with `_DOWN` for downward reserves
    ReserveId
);
string_id!(
    /// `{region}_load`
    DemandId
);

impl GeneratorId {
    pub fn for_technology(technology: &str, vintage: Option<&str>, region: &RegionId) -> Self {
        match vintage.filter(|v| !v.is_empty()) {
            Some(vintage) => Self(format!("{technology}_{vintage}_{region}")),
            None => Self(format!("{technology}_{region}")),
        }
    }
}

impl LinkId {
    pub fn between(from: &RegionId, to: &RegionId, kind: Option<&str>) -> Self {
        match kind.filter(|k| !k.is_empty()) {
            Some(kind) => Self(format!("{from}||{to}_{kind}")),
            None => Self(format!("{from}||{to}")),
        }
    }
}

impl ReserveId {
    pub fn for_region(region: &RegionId, kind: ReserveType, direction: ReserveDirection) -> Self {
        match direction {
            ReserveDirection::Up => Self(format!("{region}_{kind}")),
            ReserveDirection::Down => Self(format!("{region}_{kind}_DOWN")),
        }
    }
}

impl DemandId {
    pub fn for_region(region: &RegionId) -> Self {
        Self(format!("{region}_load"))
    }
}

/// Position of a region in the geographic hierarchy, finest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionLevel {
    BalancingArea,
    TransmissionRegion,
    Interconnect,
    Country,
}

impl RegionLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RegionLevel::BalancingArea => "balancing_area",
            RegionLevel::TransmissionRegion => "transmission_region",
            RegionLevel::Interconnect => "interconnect",
            RegionLevel::Country => "country",
        }
    }
}

/// Descriptive attributes carried over from the hierarchy file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionAttributes {
    pub state: Option<String>,
    pub nerc_region: Option<String>,
    pub transmission_region: Option<String>,
    pub interconnect: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub level: RegionLevel,
    pub parent: Option<RegionId>,
    #[serde(default)]
    pub attributes: RegionAttributes,
}

impl Region {
    pub fn new(id: impl Into<String>, level: RegionLevel) -> Self {
        Self {
            id: RegionId::new(id),
            level,
            parent: None,
            attributes: RegionAttributes::default(),
        }
    }

    pub fn with_parent(mut self, parent: RegionId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_attributes(mut self, attributes: RegionAttributes) -> Self {
        self.attributes = attributes;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generator {
    pub id: GeneratorId,
    /// Raw technology label from the source row
    pub technology: String,
    pub vintage: Option<String>,
    pub region: RegionId,
    pub category: TechnologyCategory,
    pub subtype: String,
    /// Nameplate capacity at the primary solve year
    pub capacity: Megawatts,
    pub capacity_by_year: BTreeMap<i32, Megawatts>,
    pub fuel_type: Option<String>,
}

impl Generator {
    pub fn new(technology: &str, vintage: Option<&str>, region: RegionId) -> Self {
        let vintage = vintage.filter(|v| !v.is_empty()).map(str::to_string);
        Self {
            id: GeneratorId::for_technology(technology, vintage.as_deref(), &region),
            technology: technology.to_string(),
            vintage,
            region,
            category: TechnologyCategory::Unclassified,
            subtype: technology.to_ascii_lowercase(),
            capacity: Megawatts(0.0),
            capacity_by_year: BTreeMap::new(),
            fuel_type: None,
        }
    }

    pub fn with_category(mut self, category: TechnologyCategory, subtype: &str) -> Self {
        self.category = category;
        self.subtype = subtype.to_string();
        self
    }

    pub fn with_capacity(mut self, capacity: Megawatts) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn is_variable(&self) -> bool {
        self.category.is_variable()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransmissionLink {
    pub id: LinkId,
    pub from: RegionId,
    pub to: RegionId,
    /// Corridor type such as `ac` or `dc`
    pub kind: Option<String>,
    pub forward_capacity: Megawatts,
    pub reverse_capacity: Megawatts,
}

impl TransmissionLink {
    pub fn new(
        from: &str,
        to: &str,
        kind: Option<&str>,
        forward_capacity: Megawatts,
        reverse_capacity: Megawatts,
    ) -> Self {
        let from = RegionId::new(from);
        let to = RegionId::new(to);
        let kind = kind.filter(|k| !k.is_empty()).map(str::to_string);
        Self {
            id: LinkId::between(&from, &to, kind.as_deref()),
            from,
            to,
            kind,
            forward_capacity,
            reverse_capacity,
        }
    }
}

/// How a reserve's requirement is specified.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ReserveRequirement {
    Constant(Megawatts),
    /// Hourly requirement bound as a `requirement` series
    TimeVarying,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reserve {
    pub id: ReserveId,
    pub kind: ReserveType,
    pub direction: ReserveDirection,
    pub region: RegionId,
    pub requirement: ReserveRequirement,
}

impl Reserve {
    pub fn new(
        region: RegionId,
        kind: ReserveType,
        direction: ReserveDirection,
        requirement: ReserveRequirement,
    ) -> Self {
        Self {
            id: ReserveId::for_region(&region, kind, direction),
            kind,
            direction,
            region,
            requirement,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandProfile {
    pub id: DemandId,
    pub region: RegionId,
}

impl DemandProfile {
    pub fn new(region: RegionId) -> Self {
        Self {
            id: DemandId::for_region(&region),
            region,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionRecord {
    pub generator: GeneratorId,
    pub pollutant: EmissionType,
    pub source: EmissionSource,
    pub rate: TonnesPerMwh,
}

/// Hourly (or sub-hourly) samples bound to one component.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    /// Series role such as `max_active_power` or `requirement`
    pub name: String,
    pub solve_year: Option<i32>,
    pub weather_year: i32,
    pub start: NaiveDateTime,
    pub resolution_minutes: u32,
    /// 29 February of a leap weather year has no samples
    pub skip_leap_day: bool,
    /// Shared with every other component bound to the same source slice
    pub values: Arc<[f64]>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn timestamp(&self, index: usize) -> Option<NaiveDateTime> {
        if index >= self.values.len() {
            return None;
        }
        let offset = Duration::minutes(i64::from(self.resolution_minutes) * index as i64);
        let ts = self.start.checked_add_signed(offset)?;
        let past_february = ts.month() > 2 || (ts.month() == 2 && ts.day() == 29);
        if self.skip_leap_day && ts.year() == self.start.year() && past_february {
            return ts.checked_add_signed(Duration::days(1));
        }
        Some(ts)
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Region(Region),
    Generator(Generator),
    Reserve(Reserve),
    Demand(DemandProfile),
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::Region(r) => r.id.as_str(),
            Node::Generator(g) => g.id.as_str(),
            Node::Reserve(r) => r.id.as_str(),
            Node::Demand(d) => d.id.as_str(),
        }
    }

    pub fn kind(&self) -> ComponentKind {
        match self {
            Node::Region(_) => ComponentKind::Region,
            Node::Generator(_) => ComponentKind::Generator,
            Node::Reserve(_) => ComponentKind::Reserve,
            Node::Demand(_) => ComponentKind::Demand,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Edge {
    /// Child region → parent region
    Parent,
    /// Component → owning region
    Located,
    Link(TransmissionLink),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Region,
    Generator,
    Link,
    Reserve,
    Demand,
    Emission,
}

/// Component counts for a built system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStats {
    pub regions: usize,
    pub generators: usize,
    pub links: usize,
    pub reserves: usize,
    pub demands: usize,
    pub emissions: usize,
    pub series: usize,
}

/// The built planning system.
#[derive(Debug, Clone, Default)]
pub struct System {
    graph: DiGraph<Node, Edge>,
    regions: BTreeMap<RegionId, NodeIndex>,
    generators: BTreeMap<GeneratorId, NodeIndex>,
    reserves: BTreeMap<ReserveId, NodeIndex>,
    demands: BTreeMap<DemandId, NodeIndex>,
    links: BTreeMap<LinkId, EdgeIndex>,
    emissions: Vec<EmissionRecord>,
    series: BTreeMap<String, Vec<TimeSeries>>,
}

fn reference_error(kind: &str, entity: &str, detail: impl Into<String>) -> BuildError {
    BuildError::ReferentialIntegrity {
        dataset: kind.to_string(),
        entity: entity.to_string(),
        detail: detail.into(),
    }
}

impl System {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &DiGraph<Node, Edge> {
        &self.graph
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Adds a region. Its parent, if any, must already exist at a coarser level.
    pub fn add_region(&mut self, region: Region) -> BuildResult<NodeIndex> {
        if self.regions.contains_key(&region.id) {
            return Err(reference_error("region", region.id.as_str(), "duplicate region"));
        }
        let parent_idx = match &region.parent {
            Some(parent) => {
                let idx = self.region_index(parent.as_str()).ok_or_else(|| {
                    reference_error(
                        "region",
                        region.id.as_str(),
                        format!("parent region '{parent}' does not exist"),
                    )
                })?;
                if let Node::Region(p) = &self.graph[idx] {
                    if p.level <= region.level {
                        return Err(reference_error(
                            "region",
                            region.id.as_str(),
                            format!(
                                "parent '{}' is {} but child is {}",
                                parent,
                                p.level.as_str(),
                                region.level.as_str()
                            ),
                        ));
                    }
                }
                Some(idx)
            }
            None => None,
        };
        let id = region.id.clone();
        let idx = self.graph.add_node(Node::Region(region));
        if let Some(parent_idx) = parent_idx {
            self.graph.add_edge(idx, parent_idx, Edge::Parent);
        }
        self.regions.insert(id, idx);
        Ok(idx)
    }

    pub fn add_generator(&mut self, generator: Generator) -> BuildResult<NodeIndex> {
        if self.generators.contains_key(&generator.id) {
            return Err(reference_error(
                "generator",
                generator.id.as_str(),
                "duplicate generator",
            ));
        }
        let region_idx =
            self.require_region("generator", generator.id.as_str(), &generator.region)?;
        let id = generator.id.clone();
        let idx = self.graph.add_node(Node::Generator(generator));
        self.graph.add_edge(idx, region_idx, Edge::Located);
        self.generators.insert(id, idx);
        Ok(idx)
    }

    pub fn add_link(&mut self, link: TransmissionLink) -> BuildResult<EdgeIndex> {
        if link.from == link.to {
            return Err(reference_error(
                "transmission",
                link.id.as_str(),
                "link connects a region to itself",
            ));
        }
        if self.links.contains_key(&link.id) {
            return Err(reference_error("transmission", link.id.as_str(), "duplicate link"));
        }
        let from = self.require_region("transmission", link.id.as_str(), &link.from)?;
        let to = self.require_region("transmission", link.id.as_str(), &link.to)?;
        let id = link.id.clone();
        let edge = self.graph.add_edge(from, to, Edge::Link(link));
        self.links.insert(id, edge);
        Ok(edge)
    }

    pub fn add_reserve(&mut self, reserve: Reserve) -> BuildResult<NodeIndex> {
        if self.reserves.contains_key(&reserve.id) {
            return Err(reference_error("reserve", reserve.id.as_str(), "duplicate reserve"));
        }
        let region_idx = self.require_region("reserve", reserve.id.as_str(), &reserve.region)?;
        let id = reserve.id.clone();
        let idx = self.graph.add_node(Node::Reserve(reserve));
        self.graph.add_edge(idx, region_idx, Edge::Located);
        self.reserves.insert(id, idx);
        Ok(idx)
    }

    pub fn add_demand(&mut self, demand: DemandProfile) -> BuildResult<NodeIndex> {
        if self.demands.contains_key(&demand.id) {
            return Err(reference_error("demand", demand.id.as_str(), "duplicate demand"));
        }
        let region_idx = self.require_region("demand", demand.id.as_str(), &demand.region)?;
        let id = demand.id.clone();
        let idx = self.graph.add_node(Node::Demand(demand));
        self.graph.add_edge(idx, region_idx, Edge::Located);
        self.demands.insert(id, idx);
        Ok(idx)
    }

    pub fn add_emission(&mut self, record: EmissionRecord) -> BuildResult<()> {
        if !self.generators.contains_key(&record.generator) {
            return Err(reference_error(
                "emission",
                record.generator.as_str(),
                "generator does not exist",
            ));
        }
        self.emissions.push(record);
        Ok(())
    }

    /// Binds a series to an existing generator, reserve or demand profile.
    pub fn attach_series(&mut self, owner: &str, series: TimeSeries) -> BuildResult<()> {
        if !self.has_component(owner) {
            return Err(reference_error(
                "time_series",
                owner,
                format!("no component to own series '{}'", series.name),
            ));
        }
        self.series.entry(owner.to_string()).or_default().push(series);
        Ok(())
    }

    pub fn generator_mut(&mut self, id: &str) -> Option<&mut Generator> {
        let idx = *self.generators.get(&GeneratorId::new(id))?;
        match &mut self.graph[idx] {
            Node::Generator(g) => Some(g),
            _ => None,
        }
    }

    fn require_region(
        &self,
        kind: &str,
        entity: &str,
        region: &RegionId,
    ) -> BuildResult<NodeIndex> {
        self.regions.get(region).copied().ok_or_else(|| {
            reference_error(kind, entity, format!("region '{region}' does not exist"))
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn region_index(&self, id: &str) -> Option<NodeIndex> {
        self.regions.get(&RegionId::new(id)).copied()
    }

    pub fn has_region(&self, id: &str) -> bool {
        self.regions.contains_key(&RegionId::new(id))
    }

    pub fn has_generator(&self, id: &str) -> bool {
        self.generators.contains_key(&GeneratorId::new(id))
    }

    pub fn has_component(&self, id: &str) -> bool {
        self.generators.contains_key(&GeneratorId::new(id))
            || self.reserves.contains_key(&ReserveId::new(id))
            || self.demands.contains_key(&DemandId::new(id))
            || self.regions.contains_key(&RegionId::new(id))
    }

    pub fn region(&self, id: &str) -> Option<&Region> {
        let idx = self.region_index(id)?;
        match &self.graph[idx] {
            Node::Region(r) => Some(r),
            _ => None,
        }
    }

    pub fn generator(&self, id: &str) -> Option<&Generator> {
        let idx = *self.generators.get(&GeneratorId::new(id))?;
        match &self.graph[idx] {
            Node::Generator(g) => Some(g),
            _ => None,
        }
    }

    pub fn reserve(&self, id: &str) -> Option<&Reserve> {
        let idx = *self.reserves.get(&ReserveId::new(id))?;
        match &self.graph[idx] {
            Node::Reserve(r) => Some(r),
            _ => None,
        }
    }

    pub fn demand(&self, id: &str) -> Option<&DemandProfile> {
        let idx = *self.demands.get(&DemandId::new(id))?;
        match &self.graph[idx] {
            Node::Demand(d) => Some(d),
            _ => None,
        }
    }

    pub fn link(&self, id: &str) -> Option<&TransmissionLink> {
        let edge = *self.links.get(&LinkId::new(id))?;
        match self.graph.edge_weight(edge)? {
            Edge::Link(link) => Some(link),
            _ => None,
        }
    }

    /// Regions in identifier order.
    pub fn regions(&self) -> impl Iterator<Item = &Region> + '_ {
        self.regions.values().filter_map(|idx| match &self.graph[*idx] {
            Node::Region(r) => Some(r),
            _ => None,
        })
    }

    pub fn generators(&self) -> impl Iterator<Item = &Generator> + '_ {
        self.generators
            .values()
            .filter_map(|idx| match &self.graph[*idx] {
                Node::Generator(g) => Some(g),
                _ => None,
            })
    }

    pub fn reserves(&self) -> impl Iterator<Item = &Reserve> + '_ {
        self.reserves.values().filter_map(|idx| match &self.graph[*idx] {
            Node::Reserve(r) => Some(r),
            _ => None,
        })
    }

    pub fn demands(&self) -> impl Iterator<Item = &DemandProfile> + '_ {
        self.demands.values().filter_map(|idx| match &self.graph[*idx] {
            Node::Demand(d) => Some(d),
            _ => None,
        })
    }

    pub fn links(&self) -> impl Iterator<Item = &TransmissionLink> + '_ {
        self.links
            .values()
            .filter_map(|edge| match self.graph.edge_weight(*edge) {
                Some(Edge::Link(link)) => Some(link),
                _ => None,
            })
    }

    /// Emission records in insertion order.
    pub fn emissions(&self) -> &[EmissionRecord] {
        &self.emissions
    }

    pub fn emissions_for<'a>(
        &'a self,
        generator: &'a str,
    ) -> impl Iterator<Item = &'a EmissionRecord> {
        self.emissions
            .iter()
            .filter(move |e| e.generator.as_str() == generator)
    }

    pub fn generators_in<'a>(&'a self, region: &'a str) -> impl Iterator<Item = &'a Generator> {
        self.generators().filter(move |g| g.region.as_str() == region)
    }

    pub fn time_series(&self, owner: &str) -> &[TimeSeries] {
        self.series.get(owner).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every bound series with its owner, in owner order.
    pub fn all_series(&self) -> impl Iterator<Item = (&str, &TimeSeries)> {
        self.series
            .iter()
            .flat_map(|(owner, list)| list.iter().map(move |ts| (owner.as_str(), ts)))
    }

    pub fn component_count(&self, kind: ComponentKind) -> usize {
        match kind {
            ComponentKind::Region => self.regions.len(),
            ComponentKind::Generator => self.generators.len(),
            ComponentKind::Link => self.links.len(),
            ComponentKind::Reserve => self.reserves.len(),
            ComponentKind::Demand => self.demands.len(),
            ComponentKind::Emission => self.emissions.len(),
        }
    }

    pub fn stats(&self) -> SystemStats {
        SystemStats {
            regions: self.regions.len(),
            generators: self.generators.len(),
            links: self.links.len(),
            reserves: self.reserves.len(),
            demands: self.demands.len(),
            emissions: self.emissions.len(),
            series: self.series.values().map(Vec::len).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn two_region_system() -> System {
        let mut system = System::new();
        system
            .add_region(Region::new("west", RegionLevel::TransmissionRegion))
            .unwrap();
        system
            .add_region(
                Region::new("p1", RegionLevel::BalancingArea).with_parent(RegionId::new("west")),
            )
            .unwrap();
        system
            .add_region(
                Region::new("p2", RegionLevel::BalancingArea).with_parent(RegionId::new("west")),
            )
            .unwrap();
        system
    }

    fn series(values: Vec<f64>) -> TimeSeries {
        TimeSeries {
            name: "max_active_power".into(),
            solve_year: None,
            weather_year: 2012,
            start: NaiveDate::from_ymd_opt(2012, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            resolution_minutes: 60,
            skip_leap_day: true,
            values: values.into(),
        }
    }

    #[test]
    fn naming_conventions() {
        let region = RegionId::new("p10");
        assert_eq!(
            GeneratorId::for_technology("upv_3", None, &region).as_str(),
            "upv_3_p10"
        );
        assert_eq!(
            GeneratorId::for_technology("coaloldscr", Some("init-1"), &region).as_str(),
            "coaloldscr_init-1_p10"
        );
        assert_eq!(DemandId::for_region(&region).as_str(), "p10_load");
        assert_eq!(
            ReserveId::for_region(&region, ReserveType::Regulation, ReserveDirection::Up).as_str(),
            "p10_REGULATION"
        );
        assert_eq!(
            LinkId::between(&RegionId::new("p1"), &RegionId::new("p2"), None).as_str(),
            "p1||p2"
        );
        assert_eq!(
            LinkId::between(&RegionId::new("p1"), &RegionId::new("p2"), Some("dc")).as_str(),
            "p1||p2_dc"
        );
    }

    #[test]
    fn generator_requires_existing_region() {
        let mut system = two_region_system();
        let orphan = Generator::new("wind-ons_1", None, RegionId::new("p99"));
        let err = system.add_generator(orphan).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferentialIntegrity);
        assert!(err.to_string().contains("p99"));
    }

    #[test]
    fn parent_must_be_coarser() {
        let mut system = two_region_system();
        let err = system
            .add_region(
                Region::new("p3", RegionLevel::TransmissionRegion)
                    .with_parent(RegionId::new("west")),
            )
            .unwrap_err();
        assert!(err.to_string().contains("parent 'west'"));
    }

    #[test]
    fn self_link_rejected() {
        let mut system = two_region_system();
        let err = system
            .add_link(TransmissionLink::new("p1", "p1", None, Megawatts(1.0), Megawatts(1.0)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferentialIntegrity);
    }

    #[test]
    fn queries_are_ordered_by_id() {
        let mut system = two_region_system();
        for tech in ["wind-ons_1", "gas-cc", "battery_4"] {
            system
                .add_generator(Generator::new(tech, None, RegionId::new("p2")))
                .unwrap();
        }
        let ids: Vec<_> = system.generators().map(|g| g.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["battery_4_p2", "gas-cc_p2", "wind-ons_1_p2"]);
        assert_eq!(system.generators_in("p2").count(), 3);
        assert_eq!(system.generators_in("p1").count(), 0);
    }

    #[test]
    fn emissions_need_generator() {
        let mut system = two_region_system();
        let record = EmissionRecord {
            generator: GeneratorId::new("coal_p1"),
            pollutant: EmissionType::Co2,
            source: EmissionSource::Combustion,
            rate: TonnesPerMwh(0.9),
        };
        assert!(system.add_emission(record.clone()).is_err());

        system
            .add_generator(Generator::new("coal", None, RegionId::new("p1")))
            .unwrap();
        system.add_emission(record).unwrap();
        assert_eq!(system.emissions_for("coal_p1").count(), 1);
    }

    #[test]
    fn series_are_shared_and_indexed() {
        let mut system = two_region_system();
        system
            .add_demand(DemandProfile::new(RegionId::new("p1")))
            .unwrap();
        let ts = series(vec![1.0, 2.0, 3.0]);
        let shared = ts.values.clone();
        system.attach_series("p1_load", ts).unwrap();

        let bound = &system.time_series("p1_load")[0];
        assert!(Arc::ptr_eq(&bound.values, &shared));
        assert_eq!(bound.mean(), 2.0);
        assert_eq!(bound.max(), 3.0);
        assert_eq!(
            bound.timestamp(2).unwrap().to_string(),
            "2012-01-01 02:00:00"
        );
        assert!(bound.timestamp(3).is_none());
        assert!(system.attach_series("nobody", series(vec![0.0])).is_err());
        assert_eq!(system.stats().series, 1);
    }

    #[test]
    fn timestamps_step_over_dropped_leap_day() {
        let ts = series(vec![0.0; 8760]);
        assert_eq!(ts.timestamp(59 * 24 - 1).unwrap().to_string(), "2012-02-28 23:00:00");
        assert_eq!(ts.timestamp(59 * 24).unwrap().to_string(), "2012-03-01 00:00:00");
        assert_eq!(ts.timestamp(8759).unwrap().to_string(), "2012-12-31 23:00:00");
        assert!(ts.timestamp(8760).is_none());

        let kept = TimeSeries {
            skip_leap_day: false,
            ..series(vec![0.0; 8784])
        };
        assert_eq!(kept.timestamp(59 * 24).unwrap().to_string(), "2012-02-29 00:00:00");
    }
}
