//! DHCP client model
//!
//! Minimal standard client: Init, Selecting, Requesting, Bound. It
//! broadcasts DISCOVER, retransmits with a fresh transaction id until
//! an OFFER arrives, takes the first matching OFFER, REQUESTs it from
//! the offering server, and binds on the matching ACK. It has no idea
//! whether the server it talked to was genuine; that blindness is the
//! point of the scenarios built on top.

use std::cell::RefCell;
use std::net::Ipv4Addr;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use dhcpstorm_core::Result;
use dhcpstorm_sim::{Bus, Scheduler, TapId, TimerHandle};

use crate::config::ClientConfig;
use crate::message::{DhcpMessage, MessageType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientState {
    Init,
    Selecting,
    Requesting,
    Bound,
}

/// What the client ends up configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundLease {
    pub address: Ipv4Addr,
    pub netmask: Option<Ipv4Addr>,
    pub router: Option<Ipv4Addr>,
    pub server: Option<Ipv4Addr>,
    pub lease_secs: Option<u32>,
}

pub struct DhcpClient {
    config: ClientConfig,
    rng: StdRng,
    state: ClientState,
    xid: u32,
    bound: Option<BoundLease>,
    running: bool,
    tap: Option<TapId>,
    retransmit: Option<TimerHandle>,
}

impl DhcpClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            rng,
            state: ClientState::Init,
            xid: 0,
            bound: None,
            running: false,
            tap: None,
            retransmit: None,
        })
    }

    /// Attach and broadcast the first DISCOVER.
    pub fn start(this: &Rc<RefCell<Self>>, sched: &mut Scheduler, bus: &Bus<DhcpMessage>) {
        {
            let mut me = this.borrow_mut();
            if me.running {
                return;
            }
            me.running = true;
            info!(chaddr = %me.config.mac, "client started");
        }

        let tap_this = Rc::clone(this);
        let tap_bus = bus.clone();
        let tap = bus.attach(move |sched, msg: DhcpMessage| {
            Self::on_frame(&tap_this, sched, &tap_bus, &msg);
        });
        this.borrow_mut().tap = Some(tap);

        Self::send_discover(this, sched, bus);
    }

    pub fn stop(&mut self, bus: &Bus<DhcpMessage>) {
        if !self.running {
            return;
        }
        self.running = false;
        if let Some(timer) = self.retransmit.take() {
            timer.cancel();
        }
        if let Some(tap) = self.tap.take() {
            bus.detach(tap);
        }
        info!(chaddr = %self.config.mac, "client stopped");
    }

    fn send_discover(this: &Rc<RefCell<Self>>, sched: &mut Scheduler, bus: &Bus<DhcpMessage>) {
        let msg = {
            let mut me = this.borrow_mut();
            if !me.running {
                return;
            }
            me.xid = me.rng.gen();
            me.state = ClientState::Selecting;
            debug!(chaddr = %me.config.mac, xid = me.xid, "broadcasting DISCOVER");
            DhcpMessage::discover(me.xid, me.config.mac)
        };
        let src = this.borrow().tap;
        bus.send_from(sched, src, msg);

        let next = Rc::clone(this);
        let next_bus = bus.clone();
        let delay = this.borrow().config.retransmit;
        let handle = sched.schedule_in(delay, move |s| {
            let waiting = {
                let me = next.borrow();
                me.running && me.state == ClientState::Selecting
            };
            if waiting {
                Self::send_discover(&next, s, &next_bus);
            }
        });
        this.borrow_mut().retransmit = Some(handle);
    }

    fn on_frame(
        this: &Rc<RefCell<Self>>,
        sched: &mut Scheduler,
        bus: &Bus<DhcpMessage>,
        msg: &DhcpMessage,
    ) {
        let reply = {
            let mut me = this.borrow_mut();
            if !me.running || msg.chaddr != me.config.mac {
                return;
            }
            match (me.state, msg.msg_type) {
                // First matching OFFER wins; later ones are ignored.
                (ClientState::Selecting, MessageType::Offer) if msg.xid == me.xid => {
                    if let Some(timer) = me.retransmit.take() {
                        timer.cancel();
                    }
                    me.state = ClientState::Requesting;
                    debug!(
                        chaddr = %me.config.mac,
                        address = %msg.yiaddr,
                        server = ?msg.server_id(),
                        "taking OFFER"
                    );
                    Some(DhcpMessage::request(
                        me.xid,
                        me.config.mac,
                        msg.yiaddr,
                        msg.server_id(),
                    ))
                }
                (ClientState::Requesting, MessageType::Ack) if msg.xid == me.xid => {
                    me.state = ClientState::Bound;
                    me.bound = Some(BoundLease {
                        address: msg.yiaddr,
                        netmask: msg.subnet_mask(),
                        router: msg.router(),
                        server: msg.server_id(),
                        lease_secs: msg.lease_secs(),
                    });
                    info!(chaddr = %me.config.mac, address = %msg.yiaddr, "bound");
                    None
                }
                _ => None,
            }
        };
        if let Some(reply) = reply {
            let src = this.borrow().tap;
            bus.send_from(sched, src, reply);
        }
    }

    pub fn bound(&self) -> Option<BoundLease> {
        self.bound
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}
