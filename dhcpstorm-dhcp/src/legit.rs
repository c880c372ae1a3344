//! Legitimate DHCP server model
//!
//! A deliberately standard server over one real range, used as the
//! victim in starvation scenarios. No classifier, no fabricated
//! addresses, no pool growth. It answers only REQUESTs addressed to it
//! and only for addresses it actually leased.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::rc::Rc;

use tracing::{debug, info};

use dhcpstorm_core::{MacAddr, Result};
use dhcpstorm_sim::{Bus, Scheduler, TapId, TimerHandle};

use crate::config::LegitServerConfig;
use crate::lease::{LeaseTable, TICK};
use crate::message::{DhcpMessage, MessageType, ReplyOptions, UNSPECIFIED};
use crate::responder::DhcpResponder;

pub struct LegitDhcpServer {
    config: LegitServerConfig,
    free: BTreeSet<Ipv4Addr>,
    leases: LeaseTable,
    running: bool,
    tap: Option<TapId>,
    tick_timer: Option<TimerHandle>,
}

impl LegitDhcpServer {
    pub fn new(config: LegitServerConfig) -> Result<Self> {
        config.validate()?;
        let free = (u32::from(config.range_start)..=u32::from(config.range_end))
            .map(Ipv4Addr::from)
            .collect();
        Ok(Self {
            config,
            free,
            leases: LeaseTable::new(),
            running: false,
            tap: None,
            tick_timer: None,
        })
    }

    pub fn start(this: &Rc<RefCell<Self>>, sched: &mut Scheduler, bus: &Bus<DhcpMessage>) {
        {
            let mut me = this.borrow_mut();
            if me.running {
                return;
            }
            me.running = true;
            info!(
                server = %me.config.server_addr,
                pool = me.free.len(),
                "DHCP server started"
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
        let free = &mut self.free;
        self.leases.release_all(|addr| {
            free.insert(addr);
        });
        info!(server = %self.config.server_addr, "DHCP server stopped");
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
        let free = &mut self.free;
        self.leases.tick(|addr| {
            free.insert(addr);
        });
    }

    fn reply_options(&self) -> ReplyOptions {
        ReplyOptions {
            server_id: self.config.server_addr,
            netmask: self.config.netmask,
            router: self.config.server_addr,
            lease: self.config.lease,
        }
    }

    fn allocate(&mut self, chaddr: MacAddr) -> Option<Ipv4Addr> {
        if let Some(addr) = self.leases.lookup(chaddr) {
            return Some(addr);
        }
        let addr = self.free.pop_first()?;
        self.leases.insert(chaddr, addr, self.config.lease);
        Some(addr)
    }

    fn handle_discover(&mut self, msg: &DhcpMessage) -> Option<DhcpMessage> {
        let addr = self.allocate(msg.chaddr)?;
        debug!(chaddr = %msg.chaddr, address = %addr, xid = msg.xid, "OFFER");
        Some(DhcpMessage::offer(
            msg.xid,
            msg.chaddr,
            addr,
            &self.reply_options(),
        ))
    }

    fn handle_request(&mut self, msg: &DhcpMessage) -> Option<DhcpMessage> {
        // REQUESTs naming another server are none of our business.
        if let Some(server_id) = msg.server_id() {
            if server_id != self.config.server_addr {
                return None;
            }
        }
        let requested = msg.requested_ip().unwrap_or(msg.yiaddr);
        let addr = if requested == UNSPECIFIED {
            self.allocate(msg.chaddr)?
        } else {
            // Honor only what we leased to this very client.
            match self.leases.lookup(msg.chaddr) {
                Some(addr) if addr == requested => addr,
                _ => return None,
            }
        };
        self.leases.insert(msg.chaddr, addr, self.config.lease);
        debug!(chaddr = %msg.chaddr, address = %addr, xid = msg.xid, "ACK");
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

    pub fn config(&self) -> &LegitServerConfig {
        &self.config
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn leases(&self) -> &LeaseTable {
        &self.leases
    }
}

impl DhcpResponder for LegitDhcpServer {
    fn respond(&mut self, msg: &DhcpMessage) -> Option<DhcpMessage> {
        match msg.msg_type {
            MessageType::Discover => self.handle_discover(msg),
            MessageType::Request => self.handle_request(msg),
            _ => None,
        }
    }
}
