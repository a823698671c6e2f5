use std::fmt::{Display, Formatter};

use alloy::{
    primitives::{Address, B256, keccak256},
    rpc::types::{Filter, Log},
};

/// What a watch matches on.
///
/// Every dimension is optional and an empty dimension matches everything. Within one
/// dimension the listed values are alternatives (OR); across dimensions all must match (AND).
///
/// * addresses: the emitting contract
/// * events: topic0, the keccak hash of the event signature
/// * indexed arguments: topic1..=topic3
///
/// Addresses are compared as bytes, so checksummed and lowercase spellings are the same value.
///
/// # Example
///
/// ```rust
/// use alloy::primitives::address;
/// use event_watcher::WatchCriteria;
///
/// let criteria = WatchCriteria::new()
///     .contract_address(address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"))
///     .event("Transfer(address,address,uint256)");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WatchCriteria {
    addresses: Vec<Address>,
    events: Vec<B256>,
    indexed: [Vec<B256>; 3],
}

impl WatchCriteria {
    /// Criteria matching every log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a contract address to match.
    #[must_use]
    pub fn contract_address(mut self, address: impl Into<Address>) -> Self {
        let address = address.into();
        if !self.addresses.contains(&address) {
            self.addresses.push(address);
        }
        self
    }

    /// Adds several contract addresses to match.
    #[must_use]
    pub fn contract_addresses(self, addresses: impl IntoIterator<Item = Address>) -> Self {
        addresses.into_iter().fold(self, Self::contract_address)
    }

    /// Adds an event to match by its canonical signature, e.g. `Transfer(address,address,uint256)`.
    ///
    /// The signature is hashed as given; a malformed signature simply never matches.
    #[must_use]
    pub fn event(self, signature: impl AsRef<str>) -> Self {
        self.event_hash(keccak256(signature.as_ref().as_bytes()))
    }

    /// Adds an event to match by its topic0 hash.
    #[must_use]
    pub fn event_hash(mut self, hash: B256) -> Self {
        if !self.events.contains(&hash) {
            self.events.push(hash);
        }
        self
    }

    /// Adds an accepted value for the first indexed argument (topic1).
    #[must_use]
    pub fn topic1(self, value: impl Into<B256>) -> Self {
        self.indexed_arg(0, value.into())
    }

    /// Adds an accepted value for the second indexed argument (topic2).
    #[must_use]
    pub fn topic2(self, value: impl Into<B256>) -> Self {
        self.indexed_arg(1, value.into())
    }

    /// Adds an accepted value for the third indexed argument (topic3).
    #[must_use]
    pub fn topic3(self, value: impl Into<B256>) -> Self {
        self.indexed_arg(2, value.into())
    }

    fn indexed_arg(mut self, position: usize, value: B256) -> Self {
        let values = &mut self.indexed[position];
        if !values.contains(&value) {
            values.push(value);
        }
        self
    }

    #[must_use]
    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    #[must_use]
    pub fn events(&self) -> &[B256] {
        &self.events
    }

    /// Returns `true` if the criteria constrain the event signature.
    #[must_use]
    pub fn is_event_bound(&self) -> bool {
        !self.events.is_empty()
    }

    /// Returns `true` if `log` satisfies every constrained dimension.
    #[must_use]
    pub fn matches(&self, log: &Log) -> bool {
        if !self.addresses.is_empty() && !self.addresses.contains(&log.address()) {
            return false;
        }

        let topics = log.topics();
        let topic_matches = |values: &[B256], position: usize| {
            values.is_empty() || topics.get(position).is_some_and(|topic| values.contains(topic))
        };

        topic_matches(&self.events, 0)
            && self.indexed.iter().enumerate().all(|(i, values)| topic_matches(values, i + 1))
    }
}

impl From<&WatchCriteria> for Filter {
    fn from(criteria: &WatchCriteria) -> Self {
        let mut filter = Filter::new();
        if !criteria.addresses.is_empty() {
            filter = filter.address(criteria.addresses.clone());
        }
        if !criteria.events.is_empty() {
            filter = filter.event_signature(criteria.events.clone());
        }
        let [topic1, topic2, topic3] = &criteria.indexed;
        if !topic1.is_empty() {
            filter = filter.topic1(topic1.clone());
        }
        if !topic2.is_empty() {
            filter = filter.topic2(topic2.clone());
        }
        if !topic3.is_empty() {
            filter = filter.topic3(topic3.clone());
        }
        filter
    }
}

impl From<WatchCriteria> for Filter {
    fn from(criteria: WatchCriteria) -> Self {
        Filter::from(&criteria)
    }
}

impl Display for WatchCriteria {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "WatchCriteria(")?;
        if self.addresses.is_empty() {
            write!(f, "any address")?;
        } else {
            write!(f, "addresses: [")?;
            for (i, address) in self.addresses.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{address}")?;
            }
            write!(f, "]")?;
        }
        if !self.events.is_empty() {
            write!(f, ", events: {}", self.events.len())?;
        }
        let indexed = self.indexed.iter().filter(|values| !values.is_empty()).count();
        if indexed > 0 {
            write!(f, ", indexed args: {indexed}")?;
        }
        write!(f, ")")
    }
}
