//! 链路查找
//!
//! 按链路序号找到对应的 [`LinkStatState`]，替代全局单例。

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::snapshot::LinkSnapshot;
use super::state::LinkStatState;

/// 单写者（监听线程）/多读者（展示层）共享的链路状态
pub type SharedLink = Arc<RwLock<LinkStatState>>;

pub fn shared(state: LinkStatState) -> SharedLink {
    Arc::new(RwLock::new(state))
}

/// 获取写锁；写者 panic 留下的毒化锁照常使用
pub fn write_link(link: &SharedLink) -> RwLockWriteGuard<'_, LinkStatState> {
    link.write().unwrap_or_else(PoisonError::into_inner)
}

pub fn read_link(link: &SharedLink) -> RwLockReadGuard<'_, LinkStatState> {
    link.read().unwrap_or_else(PoisonError::into_inner)
}

/// 链路序号 -> 链路状态
pub trait LinkLookup: Send + Sync {
    fn link(&self, index: usize) -> Option<SharedLink>;
}

/// 按配置顺序登记的链路
#[derive(Debug, Default, Clone)]
pub struct LinkRegistry {
    links: Vec<SharedLink>,
}

impl LinkRegistry {
    /// 登记一条链路，返回其序号
    pub fn add(&mut self, state: LinkStatState) -> usize {
        let idx = self.links.len();
        self.links.push(shared(state));
        idx
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<SharedLink> {
        self.links
            .iter()
            .find(|l| read_link(l).name() == name)
            .cloned()
    }

    /// 所有链路的快照（按序号）
    pub fn snapshots(&self) -> Vec<LinkSnapshot> {
        self.links.iter().map(|l| read_link(l).snapshot()).collect()
    }
}

impl LinkLookup for LinkRegistry {
    fn link(&self, index: usize) -> Option<SharedLink> {
        self.links.get(index).cloned()
    }
}
