//! 샤딩된 키 단위 저장소.
//!
//! 키 해시로 샤드를 고르고 샤드마다 `RwLock<HashMap>`을 두어,
//! 서로 다른 컨텍스트/소스 id끼리는 같은 락을 두고 경쟁하지 않는다.
//! 같은 키에 대한 삽입/갱신/삭제는 샤드 쓰기 락 안에서 원자적으로 수행된다.

use parking_lot::RwLock;
use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

/// 샤드 수 (2의 거듭제곱)
const SHARD_COUNT: usize = 16;

/// 키 단위 동시성 맵
#[derive(Debug)]
pub struct KeyedStore<K, V> {
    shards: Box<[RwLock<HashMap<K, V>>]>,
    hasher: RandomState,
}

impl<K, V> KeyedStore<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| RwLock::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            shards,
            hasher: RandomState::new(),
        }
    }

    #[inline]
    fn shard<Q>(&self, key: &Q) -> &RwLock<HashMap<K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(key) as usize;
        &self.shards[hash & (SHARD_COUNT - 1)]
    }

    /// 값 복제본 조회
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.shard(key).read().get(key).cloned()
    }

    /// 읽기 락 안에서 값 참조로 계산
    pub fn with<Q, R>(&self, key: &Q, f: impl FnOnce(Option<&V>) -> R) -> R
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        f(self.shard(key).read().get(key))
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard(key).read().contains_key(key)
    }

    /// 삽입 또는 교체, 이전 값 반환
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.shard(&key).write().insert(key, value)
    }

    /// 없으면 `insert()`로 만들고, 있으면 `update`로 갱신
    pub fn upsert(&self, key: K, insert: impl FnOnce() -> V, update: impl FnOnce(&mut V)) {
        let mut shard = self.shard(&key).write();
        match shard.get_mut(&key) {
            Some(existing) => update(existing),
            None => {
                shard.insert(key, insert());
            }
        }
    }

    /// 슬롯 단위 원자적 변경.
    ///
    /// 클로저가 `None`을 남기면 항목이 삭제되고, `Some`을 남기면 저장된다.
    pub fn update<R>(&self, key: K, f: impl FnOnce(&mut Option<V>) -> R) -> R {
        let mut shard = self.shard(&key).write();
        let mut slot = shard.remove(&key);
        let result = f(&mut slot);
        if let Some(value) = slot {
            shard.insert(key, value);
        }
        result
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard(key).write().remove(key)
    }

    /// 조건을 만족하는 항목만 유지, 삭제된 수 반환
    pub fn retain(&self, mut f: impl FnMut(&K, &mut V) -> bool) -> usize {
        let mut removed = 0;
        for shard in self.shards.iter() {
            let mut map = shard.write();
            let before = map.len();
            map.retain(|k, v| f(k, v));
            removed += before - map.len();
        }
        removed
    }

    /// 조건을 만족하는 항목 수
    pub fn count_where(&self, f: impl Fn(&V) -> bool) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.read().values().filter(|v| f(v)).count())
            .sum()
    }

    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.write().clear();
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }
}

impl<K, V> Default for KeyedStore<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}
