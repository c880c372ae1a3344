//! Rogue DHCP server
//!
//! Races the legitimate server for every client on the segment. Keeps a
//! real pool it can grow under pressure, falls back to fabricated
//! addresses once dry, and hands suspected starvation attackers very
//! short leases so their damage ages out quickly. Replies always
//! advertise the full default lease; the shorter internal holds are
//! invisible to clients.

use std::cell::RefCell;
use std::net::Ipv4Addr;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use dhcpstorm_core::{MacAddr, Result};
use dhcpstorm_sim::{Bus, Scheduler, TapId, TimerHandle};

use crate::classify::AttackerClassifier;
use crate::config::RogueServerConfig;
use crate::lease::{LeaseTable, TICK};
use crate::message::{DhcpMessage, MessageType, ReplyOptions, UNSPECIFIED};
use crate::pool::{AddressPool, LOW_WATERMARK};
use crate::responder::DhcpResponder;

/// Tentative hold granted at DISCOVER time, pending the client's
/// REQUEST. Deliberately not configurable.
const RESERVATION_LEASE: Duration = Duration::from_secs(10);

pub struct RogueDhcpServer {
    config: RogueServerConfig,
    pool: AddressPool,
    leases: LeaseTable,
    classifier: AttackerClassifier,
    running: bool,
    tap: Option<TapId>,
    tick_timer: Option<TimerHandle>,
}

impl RogueDhcpServer {
    pub fn new(config: RogueServerConfig) -> Result<Self> {
        config.validate()?;
        let pool = AddressPool::new(
            config.pool_start,
            config.pool_end,
            config.fake_start,
            config.fake_end,
        );
        Ok(Self {
            config,
            pool,
            leases: LeaseTable::new(),
            classifier: AttackerClassifier::new(),
            running: false,
            tap: None,
            tick_timer: None,
        })
    }

    /// Attach to the segment and arm the 1-second expiry sweep.
    pub fn start(this: &Rc<RefCell<Self>>, sched: &mut Scheduler, bus: &Bus<DhcpMessage>) {
        {
            let mut me = this.borrow_mut();
            if me.running {
                return;
            }
            me.running = true;
            info!(
                server = %me.config.server_addr,
                pool = me.pool.free_count(),
                "rogue DHCP server started"
            );
        }

        let tap_this = Rc::clone(this);
        let tap_bus = bus.clone();
        let tap = bus.attach(move |sched, msg: DhcpMessage| {
            let reply = {
                let mut me = tap_this.borrow_mut();
                if !me.running {
                    return;
                }
                me.respond(&msg)
            };
            if let Some(reply) = reply {
                let src = tap_this.borrow().tap;
                tap_bus.send_from(sched, src, reply);
            }
        });
        this.borrow_mut().tap = Some(tap);

        Self::schedule_tick(this, sched);
    }

    /// Detach, cancel the pending sweep, and drain leases back into the
    /// pool so a restart begins full.
    pub fn stop(&mut self, bus: &Bus<DhcpMessage>) {
        if !self.running {
            return;
        }
        self.running = false;
        if let Some(timer) = self.tick_timer.take() {
            timer.cancel();
        }
        if let Some(tap) = self.tap.take() {
            bus.detach(tap);
        }
        let pool = &mut self.pool;
        self.leases.release_all(|addr| pool.release(addr));
        info!(server = %self.config.server_addr, "rogue DHCP server stopped");
    }

    fn schedule_tick(this: &Rc<RefCell<Self>>, sched: &mut Scheduler) {
        let next = Rc::clone(this);
        let handle = sched.schedule_in(TICK, move |s| {
            {
                let mut me = next.borrow_mut();
                if !me.running {
                    return;
                }
                me.sweep();
            }
            Self::schedule_tick(&next, s);
        });
        this.borrow_mut().tick_timer = Some(handle);
    }

    fn sweep(&mut self) {
        let pool = &mut self.pool;
        self.leases.tick(|addr| pool.release(addr));
    }

    fn reply_options(&self) -> ReplyOptions {
        ReplyOptions {
            server_id: self.config.server_addr,
            netmask: self.config.netmask,
            router: self.config.server_addr,
            lease: self.config.default_lease,
        }
    }

    /// The allocation chain: existing lease, else real pool (expanding
    /// first when the free list runs below the watermark), else a
    /// fabricated address, else nothing.
    ///
    /// Classification happens against the pre-expansion range size, so
    /// one client can tip the heuristic and widen the pool for the next.
    fn allocate(&mut self, chaddr: MacAddr, is_discover: bool) -> Option<Ipv4Addr> {
        if let Some(addr) = self.leases.lookup(chaddr) {
            trace!(chaddr = %chaddr, address = %addr, "existing lease");
            return Some(addr);
        }

        let starvation = self.classifier.is_suspected_attacker(
            chaddr,
            self.leases.active_count(),
            self.pool.real_range_size(),
        );

        if self.config.dynamic_expansion && self.pool.free_count() < LOW_WATERMARK {
            self.pool.expand(self.config.expansion_size);
        }

        if let Some(addr) = self.pool.allocate_real() {
            let duration = if starvation {
                self.config.starvation_lease
            } else if is_discover {
                RESERVATION_LEASE
            } else {
                self.config.default_lease
            };
            self.leases.insert(chaddr, addr, duration);
            if !starvation {
                self.classifier.mark_legitimate(chaddr);
            }
            debug!(chaddr = %chaddr, address = %addr, starvation, "allocated");
            return Some(addr);
        }

        if self.config.use_fake_addresses {
            let addr = self.pool.allocate_fake();
            self.leases
                .insert(chaddr, addr, self.config.starvation_lease);
            debug!(chaddr = %chaddr, address = %addr, "pool exhausted, handing out fake");
            return Some(addr);
        }

        warn!(chaddr = %chaddr, "no addresses available");
        None
    }

    fn handle_discover(&mut self, msg: &DhcpMessage) -> Option<DhcpMessage> {
        let addr = self.allocate(msg.chaddr, true)?;
        debug!(chaddr = %msg.chaddr, address = %addr, xid = msg.xid, "spoofed OFFER");
        Some(DhcpMessage::offer(
            msg.xid,
            msg.chaddr,
            addr,
            &self.reply_options(),
        ))
    }

    fn handle_request(&mut self, msg: &DhcpMessage) -> Option<DhcpMessage> {
        let requested = msg.requested_ip().unwrap_or(msg.yiaddr);
        let addr = if requested == UNSPECIFIED {
            self.allocate(msg.chaddr, false)?
        } else {
            // Honored as-is, no membership check; claiming keeps the
            // free list consistent when the address happens to be ours,
            // and a hold displaced by the overwrite goes back to the
            // pool (release drops fabricated ones).
            if let Some(old) = self.leases.lookup(msg.chaddr) {
                if old != requested {
                    self.pool.release(old);
                }
            }
            self.pool.claim(requested);
            self.leases
                .insert(msg.chaddr, requested, self.config.default_lease);
            requested
        };
        debug!(chaddr = %msg.chaddr, address = %addr, xid = msg.xid, "spoofed ACK");
        Some(DhcpMessage::ack(
            msg.xid,
            msg.chaddr,
            addr,
            &self.reply_options(),
        ))
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn config(&self) -> &RogueServerConfig {
        &self.config
    }

    pub fn pool(&self) -> &AddressPool {
        &self.pool
    }

    pub fn leases(&self) -> &LeaseTable {
        &self.leases
    }

    pub fn classifier(&self) -> &AttackerClassifier {
        &self.classifier
    }
}

impl DhcpResponder for RogueDhcpServer {
    fn respond(&mut self, msg: &DhcpMessage) -> Option<DhcpMessage> {
        match msg.msg_type {
            MessageType::Discover => self.handle_discover(msg),
            MessageType::Request => self.handle_request(msg),
            _ => None,
        }
    }
}
