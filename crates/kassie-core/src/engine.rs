//! Engine - main entry point for running the world
//!
//! Owns the world, persistence and the scheduler. Everything happens on the
//! caller's thread: `update` moves the clock forward and runs every task
//! that fell due, each periodic task rescheduling itself.

use serde::{Deserialize, Serialize};

use kassie_logic::EntityId;

use crate::components::{Room, Ship};
use crate::config::ServerConfig;
use crate::error::{NavigationError, PersistError};
use crate::persistence::{FlushOutcome, Persistence, StorageMode};
use crate::scheduler::{Scheduler, Task};
use crate::systems::{begin_fold, begin_hoist, finish_fold, finish_hoist, ship_tick, trim_sails};
use crate::world::GameWorld;

const CLOCK_FILE: &str = "clock";

/// Ships slower than this are considered at rest and not saved every tick.
const MIN_TRACKED_SPEED: f64 = 0.01;

/// Simulated time, kept across restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
struct Clock {
    seconds: f64,
}

pub struct Engine {
    pub world: GameWorld,
    pub persistence: Persistence,
    pub scheduler: Scheduler,
    config: ServerConfig,
    started: bool,
}

impl Engine {
    /// Builds an engine with the storage the configuration asks for.
    pub fn new(config: ServerConfig) -> Result<Self, PersistError> {
        config.validate()?;
        let persistence = if config.storage.enabled {
            Persistence::configure(&config.storage.mode, &config.storage.location)?
        } else {
            Persistence::disabled()
        };
        Ok(Self::with_persistence(config, persistence))
    }

    pub fn with_persistence(config: ServerConfig, persistence: Persistence) -> Self {
        Self {
            world: GameWorld::new(),
            persistence,
            scheduler: Scheduler::new(),
            config,
            started: false,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Current simulated time, in seconds.
    pub fn now(&self) -> f64 {
        self.scheduler.now()
    }

    /// Loads the stored world and clock and schedules the periodic tasks.
    /// Returns the number of entities loaded.
    pub fn start(&mut self) -> Result<usize, PersistError> {
        if self.started {
            return Ok(0);
        }
        let loaded = self.persistence.load(&mut self.world)?;
        let clock: Clock = self.persistence.load_side_file(CLOCK_FILE)?.unwrap_or_default();
        self.scheduler = Scheduler::starting_at(clock.seconds);

        self.scheduler.schedule(self.config.storage.flush_interval, Task::PeriodicFlush);
        if self.persistence.mode() == Some(StorageMode::Document) {
            self.scheduler.schedule(self.config.storage.dirty_flush_interval, Task::DirtyFlush);
        }
        self.scheduler.schedule(self.config.simulation.ship_tick, Task::ShipTick);
        self.started = true;
        log::info!("engine started at t={:.0}s with {loaded} entities", clock.seconds);
        Ok(loaded)
    }

    /// Advances the world by `delta_seconds`.
    ///
    /// Only fatal persistence errors are returned; other failures are
    /// logged and the tick goes on.
    pub fn update(&mut self, delta_seconds: f64) -> Result<(), PersistError> {
        let target = self.scheduler.now() + delta_seconds.max(0.0);
        while let Some(task) = self.scheduler.next_due(target) {
            self.run(task)?;
        }
        self.scheduler.set_now(target);
        Ok(())
    }

    fn run(&mut self, task: Task) -> Result<(), PersistError> {
        match task {
            Task::PeriodicFlush => {
                let outcome = self.persistence.flush_all(&mut self.world);
                Self::check(outcome)?;
                self.save_clock();
                self.scheduler.schedule(self.config.storage.flush_interval, Task::PeriodicFlush);
            }
            Task::DirtyFlush => {
                let outcome = self.persistence.flush_dirty(&mut self.world);
                Self::check(outcome)?;
                self.scheduler.schedule(self.config.storage.dirty_flush_interval, Task::DirtyFlush);
            }
            Task::ShipTick => {
                self.tick_ships();
                self.scheduler.schedule(self.config.simulation.ship_tick, Task::ShipTick);
            }
            Task::FinishHoist { character, room } => {
                if finish_hoist(&mut self.world, character, room) {
                    self.touch_ship_of(room);
                }
                self.persistence.register_dirty(character);
            }
            Task::FinishFold { character, room } => {
                if finish_fold(&mut self.world, character, room) {
                    self.touch_ship_of(room);
                }
                self.persistence.register_dirty(character);
            }
        }
        Ok(())
    }

    /// Logs a failed flush, passing on only fatal errors.
    fn check(outcome: Result<FlushOutcome, PersistError>) -> Result<(), PersistError> {
        match outcome {
            Ok(FlushOutcome::Written(report)) => {
                log::debug!("flushed: {report:?}");
                Ok(())
            }
            Ok(FlushOutcome::Skipped) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                log::warn!("flush failed: {e}");
                Ok(())
            }
        }
    }

    fn save_clock(&self) {
        let clock = Clock {
            seconds: self.scheduler.now(),
        };
        if let Err(e) = self.persistence.save_side_file(CLOCK_FILE, &clock) {
            log::warn!("cannot save the clock: {e}");
        }
    }

    fn tick_ships(&mut self) {
        let dt = self.config.simulation.ship_tick;
        for ship in self.world.ids_of::<Ship>() {
            if !self.world.is_live(ship) {
                continue;
            }
            trim_sails(&mut self.world, ship);
            match ship_tick(&mut self.world, ship, dt) {
                Ok(outcome) => {
                    let moving = self
                        .world
                        .get::<Ship>(ship)
                        .is_some_and(|s| s.vessel.kinematics.speed() > MIN_TRACKED_SPEED);
                    if moving || outcome.collided {
                        self.touch_ship(ship);
                    }
                }
                Err(e) => log::warn!("cannot move ship {ship}: {e}"),
            }
        }
    }

    /// Queues a ship and all its rooms for the next dirty flush.
    fn touch_ship(&mut self, ship: EntityId) {
        let rooms: Vec<EntityId> = self
            .world
            .get::<Ship>(ship)
            .map(|s| s.rooms.values().copied().collect())
            .unwrap_or_default();
        self.persistence.register_dirty(ship);
        for room in rooms {
            self.persistence.register_dirty(room);
        }
    }

    fn touch_ship_of(&mut self, room: EntityId) {
        let ship = self
            .world
            .get::<Room>(room)
            .and_then(|r| r.ship);
        if let Some(ship) = ship {
            self.persistence.register_dirty(ship);
        }
    }

    /// Starts hoisting the sail in the character's room; it is hoisted
    /// once the handling delay has passed.
    pub fn hoist(&mut self, character: EntityId) -> Result<(), NavigationError> {
        let (room, delay) = begin_hoist(&mut self.world, character)?;
        self.scheduler.schedule(delay, Task::FinishHoist { character, room });
        self.persistence.register_dirty(character);
        Ok(())
    }

    pub fn fold(&mut self, character: EntityId) -> Result<(), NavigationError> {
        let (room, delay) = begin_fold(&mut self.world, character)?;
        self.scheduler.schedule(delay, Task::FinishFold { character, room });
        self.persistence.register_dirty(character);
        Ok(())
    }

    /// Writes everything and the clock. Call before exiting.
    pub fn shutdown(&mut self) -> Result<FlushOutcome, PersistError> {
        let outcome = self.persistence.flush_all(&mut self.world)?;
        self.save_clock();
        log::info!("engine stopped at t={:.0}s", self.scheduler.now());
        Ok(outcome)
    }
}
