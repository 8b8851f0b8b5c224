//! Registry of shared RPC connections, one per address.
//!
//! The cache is an ordinary value: build it once at startup and hand clones of the
//! `Arc<ConnectionCache>` to every component that needs a connection. Entries live as long
//! as the cache; there is no eviction.
//!
//! Lookup and insertion happen under one mutex, so concurrent first requests for the same
//! address invoke the factory exactly once. Whether the returned connection may be shared
//! by concurrent callers is up to the [`RpcConnection`] implementation;
//! [`crate::adapters::rpc::TcpJsonConnection`] serializes its calls internally.

use crate::domain::model::Address;
use crate::domain::ports::{ConnectionFactory, RpcConnection};
use crate::utils::error::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub struct ConnectionCache {
    factory: Box<dyn ConnectionFactory>,
    connections: Mutex<HashMap<Address, Arc<dyn RpcConnection>>>,
}

impl ConnectionCache {
    pub fn new<F: ConnectionFactory + 'static>(factory: F) -> Self {
        Self {
            factory: Box::new(factory),
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Return the connection for `address`, creating it on first use.
    ///
    /// Addresses that do not use the `tcp://` scheme fail with
    /// [`crate::utils::error::ClassifyError::InvalidAddress`] and leave the cache untouched.
    pub fn get_connection(&self, address: &str) -> Result<Arc<dyn RpcConnection>> {
        let address = Address::parse(address)?;

        let mut connections = self.lock();
        if let Some(existing) = connections.get(&address) {
            return Ok(Arc::clone(existing));
        }

        let connection = self.factory.connect(&address)?;
        tracing::info!("Opened RPC connection to {}", address);
        connections.insert(address, Arc::clone(&connection));
        Ok(connection)
    }

    pub fn contains(&self, address: &str) -> bool {
        Address::parse(address)
            .map(|address| self.lock().contains_key(&address))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Address, Arc<dyn RpcConnection>>> {
        // The map is only ever mutated by a single insert, so a poisoned lock still holds a
        // consistent map.
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ConnectionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let addresses: Vec<String> = self.lock().keys().map(ToString::to_string).collect();
        f.debug_struct("ConnectionCache")
            .field("addresses", &addresses)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ClassifyError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    #[derive(Debug)]
    struct NullConnection {
        address: Address,
    }

    #[async_trait]
    impl RpcConnection for NullConnection {
        fn address(&self) -> &Address {
            &self.address
        }

        async fn call(&self, _method: &str, _params: serde_json::Value) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
    }

    #[derive(Clone, Default)]
    struct CountingFactory {
        created: Arc<AtomicUsize>,
    }

    impl ConnectionFactory for CountingFactory {
        fn connect(&self, address: &Address) -> Result<Arc<dyn RpcConnection>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NullConnection {
                address: address.clone(),
            }))
        }
    }

    #[test]
    fn test_reuses_connection_for_same_address() {
        let factory = CountingFactory::default();
        let cache = ConnectionCache::new(factory.clone());

        let first = cache.get_connection("tcp://127.0.0.1:4242").unwrap();
        let second = cache.get_connection("tcp://127.0.0.1:4242").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_addresses_get_distinct_connections() {
        let factory = CountingFactory::default();
        let cache = ConnectionCache::new(factory.clone());

        let a = cache.get_connection("tcp://127.0.0.1:4242").unwrap();
        let b = cache.get_connection("tcp://127.0.0.1:4243").unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(b.address().port(), 4243);
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalid_address_is_not_cached() {
        let factory = CountingFactory::default();
        let cache = ConnectionCache::new(factory.clone());

        let result = cache.get_connection("udp://host:1");
        assert!(matches!(result, Err(ClassifyError::InvalidAddress { .. })));
        assert!(cache.is_empty());
        assert!(!cache.contains("udp://host:1"));
        assert_eq!(factory.created.load(Ordering::SeqCst), 0);

        assert!(cache.get_connection("tcp://classifier:4242").is_ok());
        assert!(cache.contains("tcp://classifier:4242"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_first_access_creates_once() {
        const CALLERS: usize = 16;

        let factory = CountingFactory::default();
        let cache = Arc::new(ConnectionCache::new(factory.clone()));
        let barrier = Arc::new(Barrier::new(CALLERS));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    cache.get_connection("tcp://127.0.0.1:4242").unwrap()
                })
            })
            .collect();

        let connections: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert!(connections.iter().all(|c| Arc::ptr_eq(c, &connections[0])));
        assert_eq!(cache.len(), 1);
    }
}
