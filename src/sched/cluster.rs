//! 集群资源状态
//!
//! 核心编号为扁平下标 `server * cores_per_server + core`。
//! 不变式：每台服务器 `free + busy == cores_per_server`，全局计数等于各服务器之和。
//! `inactive` 是 `busy` 的子集：被连续分配预留、但没有任务在跑的核心。

use crate::net::AppId;

pub type CoreId = usize;

#[derive(Debug, Clone)]
pub struct ServerState {
    /// 每个核心的占用者
    pub cores: Vec<Option<AppId>>,
    pub free: usize,
    pub busy: usize,
    pub inactive: usize,
    /// 放在这台服务器上的存储单元数
    pub storage: usize,
    /// 所在交换机被连续分配整体预留
    pub reserved: bool,
}

impl ServerState {
    fn new(cores: usize) -> Self {
        Self {
            cores: vec![None; cores],
            free: cores,
            busy: 0,
            inactive: 0,
            storage: 0,
            reserved: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.busy == 0 && !self.reserved
    }
}

#[derive(Debug, Clone)]
pub struct Cluster {
    servers: Vec<ServerState>,
    cores_per_server: usize,
    servers_per_switch: usize,
    switch_reserved: Vec<bool>,
    free: usize,
    busy: usize,
    inactive: usize,
    /// `cache` 存储策略的全局轮询游标
    pub(crate) storage_cursor: usize,
}

impl Cluster {
    pub fn new(servers: usize, cores_per_server: usize, servers_per_switch: usize) -> Self {
        let switches = servers.div_ceil(servers_per_switch.max(1));
        Self {
            servers: (0..servers).map(|_| ServerState::new(cores_per_server)).collect(),
            cores_per_server,
            servers_per_switch: servers_per_switch.max(1),
            switch_reserved: vec![false; switches],
            free: servers * cores_per_server,
            busy: 0,
            inactive: 0,
            storage_cursor: 0,
        }
    }

    pub fn num_servers(&self) -> usize {
        self.servers.len()
    }

    pub fn cores_per_server(&self) -> usize {
        self.cores_per_server
    }

    pub fn servers_per_switch(&self) -> usize {
        self.servers_per_switch
    }

    pub fn total_cores(&self) -> usize {
        self.servers.len() * self.cores_per_server
    }

    pub fn free_cores(&self) -> usize {
        self.free
    }

    pub fn busy_cores(&self) -> usize {
        self.busy
    }

    pub fn inactive_cores(&self) -> usize {
        self.inactive
    }

    /// 整个集群空闲
    pub fn is_idle(&self) -> bool {
        self.free == self.total_cores()
    }

    pub fn server(&self, idx: usize) -> &ServerState {
        &self.servers[idx]
    }

    pub fn server_of(&self, core: CoreId) -> usize {
        core / self.cores_per_server
    }

    /// 服务器的存储槽（最后一个核心位）
    pub fn storage_slot(&self, server: usize) -> CoreId {
        server * self.cores_per_server + self.cores_per_server - 1
    }

    pub fn core_owner(&self, core: CoreId) -> Option<AppId> {
        let (s, c) = self.split(core);
        self.servers[s].cores[c]
    }

    pub fn is_core_free(&self, core: CoreId) -> bool {
        self.core_owner(core).is_none()
    }

    /// 交换机下所有服务器的所有核心都空闲且未被预留
    pub fn is_switch_free(&self, switch: usize) -> bool {
        !self.switch_reserved.get(switch).copied().unwrap_or(true)
            && self.switch_servers(switch).all(|s| self.servers[s].is_empty())
    }

    pub fn is_switch_reserved(&self, switch: usize) -> bool {
        self.switch_reserved.get(switch).copied().unwrap_or(false)
    }

    pub fn switch_servers(&self, switch: usize) -> std::ops::Range<usize> {
        let lo = switch * self.servers_per_switch;
        let hi = (lo + self.servers_per_switch).min(self.servers.len());
        lo..hi
    }

    fn split(&self, core: CoreId) -> (usize, usize) {
        (core / self.cores_per_server, core % self.cores_per_server)
    }

    pub(crate) fn occupy(&mut self, core: CoreId, app: AppId, active: bool) {
        let (s, c) = self.split(core);
        let server = &mut self.servers[s];
        debug_assert!(server.cores[c].is_none(), "core {core} already taken");
        server.cores[c] = Some(app);
        server.free -= 1;
        server.busy += 1;
        self.free -= 1;
        self.busy += 1;
        if !active {
            server.inactive += 1;
            self.inactive += 1;
        }
    }

    pub(crate) fn release(&mut self, core: CoreId, active: bool) {
        let (s, c) = self.split(core);
        let server = &mut self.servers[s];
        if server.cores[c].take().is_none() {
            return;
        }
        server.free += 1;
        server.busy -= 1;
        self.free += 1;
        self.busy -= 1;
        if !active {
            server.inactive -= 1;
            self.inactive -= 1;
        }
    }

    pub(crate) fn set_switch_reserved(&mut self, switch: usize, reserved: bool) {
        self.switch_reserved[switch] = reserved;
        for s in self.switch_servers(switch) {
            self.servers[s].reserved = reserved;
        }
    }

    pub(crate) fn add_storage(&mut self, server: usize) {
        self.servers[server].storage += 1;
    }

    pub(crate) fn remove_storage(&mut self, server: usize) {
        let s = &mut self.servers[server];
        s.storage = s.storage.saturating_sub(1);
    }

    /// 检查核心计数不变式
    pub fn check_invariants(&self) -> bool {
        let per_server = self.servers.iter().all(|s| {
            s.free + s.busy == self.cores_per_server
                && s.cores.iter().filter(|c| c.is_some()).count() == s.busy
                && s.inactive <= s.busy
        });
        let free: usize = self.servers.iter().map(|s| s.free).sum();
        let busy: usize = self.servers.iter().map(|s| s.busy).sum();
        let inactive: usize = self.servers.iter().map(|s| s.inactive).sum();
        per_server && free == self.free && busy == self.busy && inactive == self.inactive
    }
}
