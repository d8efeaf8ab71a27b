//! 时间步进执行引擎
//!
//! [`SimulationContext`] 持有一次运行的全部状态：网络（拓扑、路由表、链路）、
//! 集群与调度队列、应用、在途流和随机数发生器。每一步：
//! 1. 调度已到达的应用，推进所有“可能有进展”的任务；
//! 2. 链路占用有变化时重算流速；
//! 3. 取最近的计算结束 / 流结束 / 应用到达作为步长推进时钟，退役完成的计算和流。

use indexmap::{IndexMap, IndexSet};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, trace};

use super::config::SimConfig;
use super::metrics::{AppMetrics, MemorySink, MetricsSink, RunReport};
use super::time::SimTime;
use super::workload::WorkloadSpec;
use crate::app::{Application, Step};
use crate::error::{Result, SimError};
use crate::net::{AppId, BandwidthEngine, Flow, FlowId, Network};
use crate::sched::{Cluster, Placement, Scheduler, release_application, translate};
use crate::topo::Topology;

/// 计算剩余时间低于此值视为完成
const CPU_EPS: f64 = 1e-9;
/// 流剩余字节低于此值视为完成
const FLOW_EPS: f64 = 1e-6;

pub struct SimulationContext {
    config: SimConfig,
    network: Network,
    bandwidth: BandwidthEngine,
    cluster: Cluster,
    scheduler: Scheduler,
    apps: Vec<Application>,
    running: IndexSet<AppId>,
    flows: IndexMap<FlowId, Flow>,
    next_flow: u64,
    now: SimTime,
    next_sample: Option<SimTime>,
    rng: StdRng,
    /// 待推进的 `(应用, 参与者)`
    ready: IndexSet<(AppId, usize)>,
    /// 找不到路径的 Send，下一步重试
    stalled: IndexSet<(AppId, usize)>,
    /// 已结束、尚未交给 sink 的应用指标
    done: Vec<AppMetrics>,
    dirty: bool,
}

impl SimulationContext {
    pub fn new(topo: Box<dyn Topology>, cores_per_server: usize, config: SimConfig) -> Result<Self> {
        if !(config.link_bandwidth.is_finite() && config.link_bandwidth > 0.0) {
            return Err(SimError::Workload(format!(
                "link bandwidth must be positive, got {}",
                config.link_bandwidth
            )));
        }
        if cores_per_server == 0 || topo.num_servers() == 0 {
            return Err(SimError::Topology("cluster has no cores".into()));
        }

        let cluster = Cluster::new(topo.num_servers(), cores_per_server, topo.servers_per_switch());
        let network = Network::new(topo, config.routing, config.path_policy);
        let bandwidth = BandwidthEngine {
            model: config.bandwidth_model,
            split: config.traffic_split,
            link_bandwidth: config.link_bandwidth,
            array_bandwidth: config.array_bandwidth,
        };
        let next_sample = config
            .sample_interval
            .filter(|iv| iv.is_finite() && *iv > 0.0)
            .map(SimTime);
        let rng = StdRng::seed_from_u64(config.seed);

        Ok(Self {
            config,
            network,
            bandwidth,
            cluster,
            scheduler: Scheduler::default(),
            apps: Vec::new(),
            running: IndexSet::new(),
            flows: IndexMap::new(),
            next_flow: 0,
            now: SimTime::ZERO,
            next_sample,
            rng,
            ready: IndexSet::new(),
            stalled: IndexSet::new(),
            done: Vec::new(),
            dirty: false,
        })
    }

    /// 由 workload 构建拓扑并提交其中全部应用
    pub fn from_workload(spec: &WorkloadSpec, config: SimConfig) -> Result<Self> {
        let (topo, cores_per_server) = spec.build_topology()?;
        let mut ctx = Self::new(topo, cores_per_server, config)?;
        for app in spec.build_applications()? {
            ctx.submit(app);
        }
        Ok(ctx)
    }

    /// 提交应用，返回其重新编号后的 id
    pub fn submit(&mut self, mut app: Application) -> AppId {
        let id = AppId(self.apps.len());
        app.id = id;
        app.metrics.id = id;
        self.scheduler.submit(SimTime(app.arrival), id);
        self.apps.push(app);
        id
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn flows(&self) -> &IndexMap<FlowId, Flow> {
        &self.flows
    }

    pub fn app(&self, id: AppId) -> &Application {
        &self.apps[id.0]
    }

    pub fn running(&self) -> usize {
        self.running.len()
    }

    pub fn is_done(&self) -> bool {
        self.running.is_empty() && self.scheduler.is_empty()
    }

    /// 跑到所有应用结束，返回 makespan
    #[tracing::instrument(skip(self, sink), fields(apps = self.apps.len()))]
    pub fn run(&mut self, sink: &mut dyn MetricsSink) -> Result<SimTime> {
        info!(
            servers = self.cluster.num_servers(),
            cores = self.cluster.total_cores(),
            switches = self.network.routing().num_switches(),
            "▶️ 仿真开始"
        );
        while self.step(sink)? {}
        info!(makespan = self.now.secs(), "✅ 仿真完成");
        Ok(self.now)
    }

    /// 推进一步；全部结束时返回 `false`
    pub fn step(&mut self, sink: &mut dyn MetricsSink) -> Result<bool> {
        self.settle()?;
        for metrics in self.done.drain(..) {
            sink.record(metrics);
        }
        if self.is_done() {
            return Ok(false);
        }
        if self.dirty {
            self.bandwidth.recompute(self.network.links(), &mut self.flows);
            self.dirty = false;
        }
        let dt = self.next_delta()?;
        self.advance(dt, sink);
        Ok(true)
    }

    pub fn report(&self, sink: MemorySink) -> RunReport {
        RunReport::new(
            self.now.secs(),
            sink,
            self.network.sharing_histogram(),
            self.network
                .utilization(self.config.link_bandwidth, self.now.secs()),
        )
    }

    /// 调度与推进任务直到没有新的进展（应用结束会释放资源，可能让队首得以放置）
    fn settle(&mut self) -> Result<()> {
        let retry: Vec<_> = self.stalled.drain(..).collect();
        self.ready.extend(retry);
        loop {
            self.schedule()?;
            let finished = self.done.len();
            while let Some((app, task)) = self.ready.pop() {
                self.drive(app, task);
            }
            if self.done.len() == finished {
                return Ok(());
            }
        }
    }

    fn schedule(&mut self) -> Result<()> {
        loop {
            let placement = self.scheduler.place_head(
                self.now,
                &mut self.cluster,
                self.network.routing(),
                &mut self.apps,
                &mut self.rng,
            )?;
            let Placement::Placed(id) = placement else {
                return Ok(());
            };
            debug_assert!(self.cluster.check_invariants());
            self.running.insert(id);
            let n = self.apps[id.0].participants_len();
            self.ready.extend((0..n).map(|t| (id, t)));
        }
    }

    /// 推进一个参与者：不断尝试其队首事件，直到它需要等待
    fn drive(&mut self, app_id: AppId, task: usize) {
        let cps = self.cluster.cores_per_server();
        let window = self.config.injection_window;
        loop {
            let app = &mut self.apps[app_id.0];
            match app.participants[task].poll(window) {
                Step::Wait => break,
                Step::StartCompute { duration } => {
                    app.participants[task].start_compute(duration);
                }
                Step::Consume { from, tag } => {
                    app.participants[task].consume_recv(from, tag);
                }
                Step::Inject {
                    to,
                    bytes,
                    tag,
                    class,
                } => {
                    let src = translate(&app.translation, task, cps);
                    let dst = translate(&app.translation, to, cps);
                    if bytes == 0 || src == dst {
                        app.participants[task].complete_local_send();
                        app.participants[to].deliver(task, tag);
                        self.ready.insert((app_id, to));
                        continue;
                    }

                    let n = self.config.subflows.max(1);
                    let mut paths = Vec::with_capacity(n);
                    for _ in 0..n {
                        match self.network.route(app_id, src, dst) {
                            Some(p) => paths.push(p),
                            None => break,
                        }
                    }
                    if paths.len() < n {
                        debug!(app = app_id.0, task, src, dst, "无可用路径，下一步重试");
                        self.stalled.insert((app_id, task));
                        break;
                    }

                    let seq = self.apps[app_id.0].participants[task].start_send(n);
                    let share = bytes as f64 / n as f64;
                    for path in paths {
                        let id = FlowId(self.next_flow);
                        self.next_flow += 1;
                        let flow = Flow {
                            id,
                            app: app_id,
                            src_task: task,
                            dst_task: to,
                            send_seq: seq,
                            tag,
                            class,
                            bytes: share,
                            remaining: share,
                            speed: f64::INFINITY,
                            links: self.network.path_links(&path),
                            path,
                            started: self.now.secs(),
                            max_link_flows: 0,
                        };
                        trace!(flow = id.0, app = app_id.0, src, dst, hops = flow.path.len(), "注入流");
                        self.network.attach(&flow);
                        self.flows.insert(id, flow);
                    }
                    self.dirty = true;
                }
            }
        }

        let app = &mut self.apps[app_id.0];
        let state = &mut app.participants[task];
        if state.finished || !state.is_drained() {
            return;
        }
        state.finished = true;
        trace!(app = app_id.0, task, "任务结束");
        if app.is_finished() {
            self.finish(app_id);
        }
    }

    fn finish(&mut self, id: AppId) {
        let now = self.now.secs();
        let app = &mut self.apps[id.0];
        let cpu: f64 = app.participants.iter().map(|t| t.cpu_time).sum();
        app.metrics.finalize(now, cpu);
        release_application(app, &mut self.cluster);
        self.running.swap_remove(&id);
        debug_assert!(self.cluster.check_invariants());
        info!(
            app = id.0,
            runtime = app.metrics.runtime,
            flows = app.metrics.flows,
            "🏁 应用结束"
        );
        self.done.push(app.metrics.clone());
    }

    /// 到下一个计算结束、流结束或应用到达的时间
    fn next_delta(&self) -> Result<f64> {
        let mut dt = f64::INFINITY;
        for id in &self.running {
            for state in &self.apps[id.0].participants {
                for r in state.cpu_remaining() {
                    dt = dt.min(r);
                }
            }
        }
        for flow in self.flows.values() {
            if let Some(t) = flow.time_left() {
                dt = dt.min(t);
            }
        }
        if let Some(at) = self.scheduler.next_arrival() {
            if at > self.now {
                dt = dt.min(at - self.now);
            }
        }
        if !dt.is_finite() {
            return Err(SimError::Deadlock {
                at: self.now.secs(),
                running: self.running.len(),
            });
        }

        let mut dt = dt.max(SimTime::MIN_STEP);
        if let Some(at) = self.next_sample {
            dt = dt.min((at - self.now).max(SimTime::MIN_STEP));
        }
        Ok(dt)
    }

    fn advance(&mut self, dt: f64, sink: &mut dyn MetricsSink) {
        let rate: f64 = self.flows.values().map(|f| f.speed).sum();
        let mut next = self.now + dt;
        if let Some(at) = self.scheduler.next_arrival() {
            if at > self.now && (at - next).abs() <= SimTime::MIN_STEP {
                next = at;
            }
        }
        self.now = next;
        trace!(t = self.now.secs(), dt, flows = self.flows.len(), "推进时钟");

        for id in self.running.iter().copied() {
            for (t, state) in self.apps[id.0].participants.iter_mut().enumerate() {
                if state.tick_cpu(dt, CPU_EPS) > 0 {
                    self.ready.insert((id, t));
                }
            }
        }

        let mut finished = Vec::new();
        for flow in self.flows.values_mut() {
            let moved = (flow.speed * dt).min(flow.remaining);
            flow.remaining -= moved;
            self.network.account(&flow.links, moved);
            if flow.remaining <= FLOW_EPS {
                finished.push(flow.id);
            }
        }
        for id in finished {
            self.retire(id);
        }

        if let Some(iv) = self.config.sample_interval {
            while let Some(at) = self.next_sample.filter(|at| self.now.secs() + 1e-12 >= at.secs()) {
                sink.record_sample(at.secs(), rate);
                self.next_sample = Some(at + iv);
            }
        }
    }

    /// 流完成：释放链路，整条消息的子流都到齐时投递给接收方
    fn retire(&mut self, id: FlowId) {
        let Some(flow) = self.flows.swap_remove(&id) else {
            return;
        };
        self.network.detach(&flow);
        let app = &mut self.apps[flow.app.0];
        app.metrics.record_flow(
            flow.bytes,
            flow.path.len().saturating_sub(2),
            self.now.secs() - flow.started,
        );
        if app.participants[flow.src_task].subflow_done(flow.send_seq) {
            app.participants[flow.dst_task].deliver(flow.src_task, flow.tag);
            trace!(
                app = flow.app.0,
                from = flow.src_task,
                to = flow.dst_task,
                tag = flow.tag,
                "消息送达"
            );
        }
        self.ready.insert((flow.app, flow.src_task));
        self.ready.insert((flow.app, flow.dst_task));
        self.dirty = true;
    }
}
