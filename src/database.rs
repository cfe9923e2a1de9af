//! Spectroscopic line records and the provider that fetches and caches them.

pub mod cache;
pub mod par;

use self::cache::{CacheKey, LineStore};
use crate::{error::DatabaseError, io::Verbosity, molecule::Molecule};
use atomic_counter::{AtomicCounter, RelaxedCounter};
use std::{
    collections::HashMap,
    fmt,
    str::FromStr,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Floating-point precision to use for line data.
#[allow(non_camel_case_types)]
pub type fln = f64;

/// Remote line database to obtain line lists from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(rename_all = "lowercase"))]
pub enum DatabaseSource {
    Hitran,
    Hitemp,
}

impl DatabaseSource {
    pub const ALL: [Self; 2] = [Self::Hitran, Self::Hitemp];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Hitran => "hitran",
            Self::Hitemp => "hitemp",
        }
    }

    /// Whether downloading from this source requires a registered account.
    pub fn requires_authentication(&self) -> bool {
        match self {
            Self::Hitran => false,
            Self::Hitemp => true,
        }
    }
}

impl Default for DatabaseSource {
    fn default() -> Self {
        Self::Hitran
    }
}

impl fmt::Display for DatabaseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DatabaseSource {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|source| source.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                DatabaseError::InvalidRequest(format!(
                    "Unsupported database {}, valid databases are [{}]",
                    s,
                    Self::ALL.map(|source| source.name()).join(", ")
                ))
            })
    }
}

/// Closed interval of wavenumbers [cm⁻¹] with `min < max`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WavenumberRange {
    min: fln,
    max: fln,
}

impl WavenumberRange {
    pub fn new(min: fln, max: fln) -> Result<Self, DatabaseError> {
        if min.is_finite() && max.is_finite() && min >= 0.0 && min < max {
            Ok(Self { min, max })
        } else {
            Err(DatabaseError::InvalidRequest(format!(
                "Wavenumber range must satisfy 0 <= min < max, got [{}, {}]",
                min, max
            )))
        }
    }

    pub fn min(&self) -> fln {
        self.min
    }

    pub fn max(&self) -> fln {
        self.max
    }

    pub fn contains(&self, wavenumber: fln) -> bool {
        wavenumber >= self.min && wavenumber <= self.max
    }
}

impl fmt::Display for WavenumberRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}] cm⁻¹", self.min, self.max)
    }
}

/// Broadening coefficients of a line for a collision partner other than air or self.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct PartnerBroadening {
    pub partner: String,
    /// Lorentz half width at reference temperature and pressure [cm⁻¹/atm].
    pub width: fln,
    pub temperature_exponent: fln,
}

/// One spectroscopic transition, with quantities given at the reference
/// temperature of 296 K and pressure of 1 atm.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct LineRecord {
    /// HITRAN molecule number.
    pub molecule_id: u8,
    /// HITRAN local isotopologue number.
    pub isotope: u8,
    /// Vacuum wavenumber of the transition [cm⁻¹].
    pub wavenumber: fln,
    /// Line intensity [cm⁻¹/(molecule cm⁻²)].
    pub intensity: fln,
    /// Einstein A coefficient [s⁻¹].
    pub einstein_a: fln,
    /// Air-broadened Lorentz half width [cm⁻¹/atm].
    pub air_width: fln,
    /// Self-broadened Lorentz half width [cm⁻¹/atm].
    pub self_width: fln,
    /// Lower-state energy [cm⁻¹].
    pub lower_state_energy: fln,
    /// Temperature exponent of the air-broadened width.
    pub air_temperature_exponent: fln,
    /// Air pressure-induced line shift [cm⁻¹/atm].
    pub air_pressure_shift: fln,
    #[cfg_attr(feature = "serialization", serde(default))]
    pub partner_broadening: Vec<PartnerBroadening>,
}

impl LineRecord {
    /// Returns the width and temperature exponent for the given broadening
    /// partner, falling back to the air values when the partner is not listed.
    pub fn broadening_for_partner(&self, partner: &str) -> (fln, fln) {
        if partner.eq_ignore_ascii_case("air") {
            return (self.air_width, self.air_temperature_exponent);
        }
        self.partner_broadening
            .iter()
            .find(|entry| entry.partner.eq_ignore_ascii_case(partner))
            .map(|entry| (entry.width, entry.temperature_exponent))
            .unwrap_or((self.air_width, self.air_temperature_exponent))
    }
}

/// Login credentials for a remote line database.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A validated request for the lines of some isotopologues of a molecule in a
/// wavenumber range.
#[derive(Clone, Debug)]
pub struct LineRequest {
    pub molecule: &'static Molecule,
    pub isotopes: Vec<u8>,
    pub range: WavenumberRange,
    pub source: DatabaseSource,
}

impl LineRequest {
    pub fn new(
        molecule: &'static Molecule,
        isotopes: &[u8],
        range: WavenumberRange,
        source: DatabaseSource,
    ) -> Result<Self, DatabaseError> {
        let mut isotopes = isotopes.to_vec();
        isotopes.sort_unstable();
        isotopes.dedup();
        if isotopes.is_empty() {
            return Err(DatabaseError::InvalidRequest(format!(
                "No isotopologues requested for {}",
                molecule
            )));
        }
        if let Some(&invalid) = isotopes
            .iter()
            .find(|&&isotope| molecule.isotopologue(isotope).is_none())
        {
            return Err(DatabaseError::InvalidRequest(format!(
                "Invalid isotopologue {} for {}",
                invalid, molecule
            )));
        }
        Ok(Self {
            molecule,
            isotopes,
            range,
            source,
        })
    }

    /// Isotopes in the comma-separated format used by line databases.
    pub fn isotopes_string(&self) -> String {
        self.isotopes
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Whether the given line belongs to the requested set.
    pub fn matches(&self, line: &LineRecord) -> bool {
        line.molecule_id == self.molecule.id
            && self.isotopes.contains(&line.isotope)
            && self.range.contains(line.wavenumber)
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.molecule.id, &self.isotopes, self.range, self.source)
    }

    fn data_unavailable_error(&self) -> DatabaseError {
        DatabaseError::DataUnavailable {
            database: self.source,
            molecule: self.molecule.formula.to_string(),
            isotopes: self.isotopes_string(),
            range: self.range,
        }
    }
}

/// Remote source of line lists. Implementations perform the actual transfer
/// and any authentication handshake.
pub trait RemoteLineDatabase: Send + Sync {
    /// Downloads the lines matching the request. An empty list means the
    /// source has no data for the request. The timeout bounds the whole
    /// transfer when given.
    fn fetch(
        &self,
        request: &LineRequest,
        credentials: Option<&Credentials>,
        timeout: Option<Duration>,
    ) -> Result<Vec<LineRecord>, DatabaseError>;
}

/// Collaborator asked for credentials when a source requires them and none
/// were supplied.
pub trait CredentialPrompt: Send + Sync {
    fn prompt(&self, source: DatabaseSource) -> Option<Credentials>;
}

/// Counters of how line requests were served.
pub struct FetchStatistics {
    remote_fetches: RelaxedCounter,
    store_hits: RelaxedCounter,
    memory_hits: RelaxedCounter,
}

impl FetchStatistics {
    fn new() -> Self {
        Self {
            remote_fetches: RelaxedCounter::new(0),
            store_hits: RelaxedCounter::new(0),
            memory_hits: RelaxedCounter::new(0),
        }
    }

    /// Number of requests that went to the remote database.
    pub fn remote_fetches(&self) -> usize {
        self.remote_fetches.get()
    }

    /// Number of requests served from the persistent line store.
    pub fn store_hits(&self) -> usize {
        self.store_hits.get()
    }

    /// Number of requests served from the in-process cache.
    pub fn memory_hits(&self) -> usize {
        self.memory_hits.get()
    }
}

impl fmt::Debug for FetchStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchStatistics")
            .field("remote_fetches", &self.remote_fetches())
            .field("store_hits", &self.store_hits())
            .field("memory_hits", &self.memory_hits())
            .finish()
    }
}

type CacheSlot = Arc<Mutex<Option<Arc<[LineRecord]>>>>;

/// Resolves line requests against an in-process cache, a persistent line
/// store and finally a remote database.
///
/// Concurrent requests for the same key are serialized so that at most one of
/// them reaches the remote; the others wait and share its result.
pub struct LineDatabaseProvider<R, S> {
    remote: R,
    store: S,
    credential_prompt: Option<Box<dyn CredentialPrompt>>,
    slots: Mutex<HashMap<CacheKey, CacheSlot>>,
    known_credentials: Mutex<HashMap<DatabaseSource, Option<Credentials>>>,
    statistics: FetchStatistics,
    verbosity: Verbosity,
}

impl<R, S> LineDatabaseProvider<R, S>
where
    R: RemoteLineDatabase,
    S: LineStore,
{
    pub fn new(remote: R, store: S) -> Self {
        Self {
            remote,
            store,
            credential_prompt: None,
            slots: Mutex::new(HashMap::new()),
            known_credentials: Mutex::new(HashMap::new()),
            statistics: FetchStatistics::new(),
            verbosity: Verbosity::Quiet,
        }
    }

    pub fn with_credential_prompt<P: CredentialPrompt + 'static>(mut self, prompt: P) -> Self {
        self.credential_prompt = Some(Box::new(prompt));
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn statistics(&self) -> &FetchStatistics {
        &self.statistics
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Returns the lines of the given isotopologues of the molecule within the
    /// wavenumber range, fetching them from the remote on the first request.
    pub fn fetch_lines(
        &self,
        molecule: &'static Molecule,
        isotopes: &[u8],
        range: WavenumberRange,
        source: DatabaseSource,
        credentials: Option<&Credentials>,
        timeout: Option<Duration>,
    ) -> Result<Arc<[LineRecord]>, DatabaseError> {
        let request = LineRequest::new(molecule, isotopes, range, source)?;
        let key = request.cache_key();

        let slot = self.slot_for(&key);
        let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(lines) = slot.as_ref() {
            self.statistics.memory_hits.inc();
            if self.verbosity.print_messages() {
                println!("Using cached {} lines for {}", source, key);
            }
            return Ok(Arc::clone(lines));
        }

        let lines: Arc<[LineRecord]> = match self.load_from_store(&key) {
            Some(lines) => {
                self.statistics.store_hits.inc();
                if self.verbosity.print_messages() {
                    println!("Loaded {} stored lines for {}", lines.len(), key);
                }
                lines.into()
            }
            None => self.fetch_from_remote(&request, &key, credentials, timeout)?.into(),
        };

        *slot = Some(Arc::clone(&lines));
        Ok(lines)
    }

    fn slot_for(&self, key: &CacheKey) -> CacheSlot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    fn load_from_store(&self, key: &CacheKey) -> Option<Vec<LineRecord>> {
        match self.store.load(key) {
            Ok(Some(lines)) if !lines.is_empty() => Some(lines),
            Ok(_) => None,
            Err(err) => {
                if self.verbosity.print_warnings() {
                    eprintln!(
                        "Warning: Could not read stored lines for {}, fetching again: {}",
                        key, err
                    );
                }
                None
            }
        }
    }

    fn fetch_from_remote(
        &self,
        request: &LineRequest,
        key: &CacheKey,
        credentials: Option<&Credentials>,
        timeout: Option<Duration>,
    ) -> Result<Vec<LineRecord>, DatabaseError> {
        let credentials = self.resolve_credentials(request.source, credentials)?;

        if self.verbosity.print_messages() {
            println!(
                "Fetching {} lines for {} (isotopes {}) in {}",
                request.source,
                request.molecule,
                request.isotopes_string(),
                request.range
            );
        }
        self.statistics.remote_fetches.inc();
        let mut lines = self
            .remote
            .fetch(request, credentials.as_ref(), timeout)?;

        lines.retain(|line| request.matches(line));
        if lines.is_empty() {
            return Err(request.data_unavailable_error());
        }
        lines.sort_by(|a, b| a.wavenumber.total_cmp(&b.wavenumber));

        self.store.save(key, &lines)?;
        Ok(lines)
    }

    fn resolve_credentials(
        &self,
        source: DatabaseSource,
        credentials: Option<&Credentials>,
    ) -> Result<Option<Credentials>, DatabaseError> {
        if let Some(credentials) = credentials {
            return Ok(Some(credentials.clone()));
        }
        if !source.requires_authentication() {
            return Ok(None);
        }
        let mut known_credentials = self
            .known_credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let credentials = known_credentials.entry(source).or_insert_with(|| {
            self.credential_prompt
                .as_ref()
                .and_then(|prompt| prompt.prompt(source))
        });
        credentials
            .clone()
            .map(Some)
            .ok_or_else(|| DatabaseError::Authentication {
                database: source,
                reason: "no credentials available".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{cache::MemoryLineStore, *};
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
    };

    fn line(wavenumber: fln, isotope: u8) -> LineRecord {
        LineRecord {
            molecule_id: 2,
            isotope,
            wavenumber,
            intensity: 1e-20,
            einstein_a: 1.0,
            air_width: 0.07,
            self_width: 0.09,
            lower_state_energy: 100.0,
            air_temperature_exponent: 0.75,
            air_pressure_shift: -0.001,
            partner_broadening: Vec::new(),
        }
    }

    #[derive(Default)]
    struct CountingRemote {
        fetches: AtomicUsize,
    }

    impl RemoteLineDatabase for CountingRemote {
        fn fetch(
            &self,
            request: &LineRequest,
            credentials: Option<&Credentials>,
            _timeout: Option<Duration>,
        ) -> Result<Vec<LineRecord>, DatabaseError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if request.source.requires_authentication()
                && credentials.map(Credentials::password) != Some("hunter2")
            {
                return Err(DatabaseError::Authentication {
                    database: request.source,
                    reason: "rejected".to_string(),
                });
            }
            thread::sleep(Duration::from_millis(20));
            Ok(vec![
                line(1005.0, 1),
                line(1001.0, 1),
                line(1002.0, 2),
                line(2000.0, 1),
            ])
        }
    }

    struct CountingPrompt(Arc<AtomicUsize>);

    impl CredentialPrompt for CountingPrompt {
        fn prompt(&self, _source: DatabaseSource) -> Option<Credentials> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Some(Credentials::new("user", "hunter2"))
        }
    }

    fn co2() -> &'static Molecule {
        Molecule::from_formula("CO2").unwrap()
    }

    #[test]
    fn repeated_fetch_uses_cache() {
        let provider = LineDatabaseProvider::new(CountingRemote::default(), MemoryLineStore::new());
        let range = WavenumberRange::new(1000.0, 1010.0).unwrap();
        let first = provider
            .fetch_lines(co2(), &[1], range, DatabaseSource::Hitran, None, None)
            .unwrap();
        let second = provider
            .fetch_lines(co2(), &[1], range, DatabaseSource::Hitran, None, None)
            .unwrap();
        assert_eq!(provider.remote().fetches.load(Ordering::SeqCst), 1);
        assert_eq!(provider.statistics().remote_fetches(), 1);
        assert_eq!(provider.statistics().memory_hits(), 1);
        assert_eq!(first, second);
        let wavenumbers: Vec<_> = first.iter().map(|line| line.wavenumber).collect();
        assert_eq!(wavenumbers, vec![1001.0, 1005.0]);
    }

    #[test]
    fn different_keys_fetch_separately() {
        let provider = LineDatabaseProvider::new(CountingRemote::default(), MemoryLineStore::new());
        let range = WavenumberRange::new(1000.0, 1010.0).unwrap();
        provider
            .fetch_lines(co2(), &[1], range, DatabaseSource::Hitran, None, None)
            .unwrap();
        let both = provider
            .fetch_lines(co2(), &[2, 1], range, DatabaseSource::Hitran, None, None)
            .unwrap();
        assert_eq!(both.len(), 3);
        assert_eq!(provider.statistics().remote_fetches(), 2);
    }

    #[test]
    fn concurrent_fetches_of_same_key_reach_remote_once() {
        let provider = Arc::new(LineDatabaseProvider::new(
            CountingRemote::default(),
            MemoryLineStore::new(),
        ));
        let range = WavenumberRange::new(1000.0, 1010.0).unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provider = Arc::clone(&provider);
                thread::spawn(move || {
                    provider
                        .fetch_lines(co2(), &[1], range, DatabaseSource::Hitran, None, None)
                        .unwrap()
                        .len()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 2);
        }
        assert_eq!(provider.remote().fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_range_is_unavailable() {
        let provider = LineDatabaseProvider::new(CountingRemote::default(), MemoryLineStore::new());
        let range = WavenumberRange::new(3000.0, 3100.0).unwrap();
        let result = provider.fetch_lines(co2(), &[1], range, DatabaseSource::Hitran, None, None);
        assert!(matches!(result, Err(DatabaseError::DataUnavailable { .. })));
    }

    #[test]
    fn authentication_requires_credentials() {
        let provider = LineDatabaseProvider::new(CountingRemote::default(), MemoryLineStore::new());
        let range = WavenumberRange::new(1000.0, 1010.0).unwrap();
        let result = provider.fetch_lines(co2(), &[1], range, DatabaseSource::Hitemp, None, None);
        assert!(matches!(result, Err(DatabaseError::Authentication { .. })));
        assert_eq!(provider.remote().fetches.load(Ordering::SeqCst), 0);

        let wrong = Credentials::new("user", "wrong");
        let result =
            provider.fetch_lines(co2(), &[1], range, DatabaseSource::Hitemp, Some(&wrong), None);
        assert!(matches!(result, Err(DatabaseError::Authentication { .. })));

        let right = Credentials::new("user", "hunter2");
        assert!(provider
            .fetch_lines(co2(), &[1], range, DatabaseSource::Hitemp, Some(&right), None)
            .is_ok());
    }

    #[test]
    fn credentials_are_prompted_once() {
        let prompts = Arc::new(AtomicUsize::new(0));
        let provider = LineDatabaseProvider::new(CountingRemote::default(), MemoryLineStore::new())
            .with_credential_prompt(CountingPrompt(Arc::clone(&prompts)));
        for (min, max) in [(1000.0, 1010.0), (1000.0, 1006.0)] {
            let range = WavenumberRange::new(min, max).unwrap();
            provider
                .fetch_lines(co2(), &[1], range, DatabaseSource::Hitemp, None, None)
                .unwrap();
        }
        assert_eq!(prompts.load(Ordering::SeqCst), 1);
        assert_eq!(provider.statistics().remote_fetches(), 2);
    }

    #[test]
    fn invalid_requests_are_rejected() {
        assert!(WavenumberRange::new(1010.0, 1000.0).is_err());
        assert!(WavenumberRange::new(1000.0, 1000.0).is_err());
        assert!(WavenumberRange::new(fln::NAN, 1000.0).is_err());
        let range = WavenumberRange::new(1000.0, 1010.0).unwrap();
        assert!(LineRequest::new(co2(), &[], range, DatabaseSource::Hitran).is_err());
        assert!(LineRequest::new(co2(), &[7], range, DatabaseSource::Hitran).is_err());
        assert!("exomol".parse::<DatabaseSource>().is_err());
        assert_eq!("HITEMP".parse::<DatabaseSource>().unwrap(), DatabaseSource::Hitemp);
    }

    #[test]
    fn partner_broadening_falls_back_to_air() {
        let mut record = line(1000.0, 1);
        record.partner_broadening.push(PartnerBroadening {
            partner: "H2".to_string(),
            width: 0.1,
            temperature_exponent: 0.5,
        });
        assert_eq!(record.broadening_for_partner("h2"), (0.1, 0.5));
        assert_eq!(record.broadening_for_partner("He"), (0.07, 0.75));
        assert_eq!(record.broadening_for_partner("air"), (0.07, 0.75));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let credentials = Credentials::new("user", "hunter2");
        assert!(!format!("{:?}", credentials).contains("hunter2"));
    }
}
