//! DHCP starvation attacker
//!
//! Floods DISCOVERs with a freshly forged source MAC each time, at a
//! fixed interval. Never completes a handshake; the point is to make a
//! server reserve an address per forged client until its pool runs dry.
//! Fully deterministic for a given seed.

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, trace};

use dhcpstorm_core::{MacAddr, Result};
use dhcpstorm_sim::{Bus, Scheduler, TimerHandle};

use crate::config::StarvationConfig;
use crate::message::DhcpMessage;

pub struct StarvationClient {
    config: StarvationConfig,
    rng: StdRng,
    sent: u64,
    running: bool,
    timer: Option<TimerHandle>,
}

impl StarvationClient {
    pub fn new(config: StarvationConfig) -> Result<Self> {
        config.validate()?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            rng,
            sent: 0,
            running: false,
            timer: None,
        })
    }

    /// Begin flooding. The first DISCOVER goes out immediately, the
    /// rest at the configured interval.
    pub fn start(this: &Rc<RefCell<Self>>, sched: &mut Scheduler, bus: &Bus<DhcpMessage>) {
        {
            let mut me = this.borrow_mut();
            if me.running {
                return;
            }
            me.running = true;
            info!(interval = ?me.config.interval, "starvation flood started");
        }
        Self::send_next(this, sched, bus);
    }

    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        info!(sent = self.sent, "starvation flood stopped");
    }

    fn send_next(this: &Rc<RefCell<Self>>, sched: &mut Scheduler, bus: &Bus<DhcpMessage>) {
        let msg = {
            let mut me = this.borrow_mut();
            if !me.running {
                return;
            }
            let chaddr = me.forge_mac();
            let xid = me.rng.gen();
            me.sent += 1;
            trace!(chaddr = %chaddr, xid, sent = me.sent, "flooding DISCOVER");
            DhcpMessage::discover(xid, chaddr)
        };
        bus.send_from(sched, None, msg);

        let next = Rc::clone(this);
        let next_bus = bus.clone();
        let interval = this.borrow().config.interval;
        let handle = sched.schedule_in(interval, move |s| {
            Self::send_next(&next, s, &next_bus);
        });
        this.borrow_mut().timer = Some(handle);
    }

    /// Random locally administered unicast MAC, so the forgeries never
    /// collide with real vendor space.
    fn forge_mac(&mut self) -> MacAddr {
        let mut octets = [0u8; 6];
        self.rng.fill(&mut octets);
        octets[0] = (octets[0] | 0x02) & 0xFE;
        MacAddr::new(octets)
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}
