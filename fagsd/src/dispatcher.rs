use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use fanet::{
    Address, Coordinate, PacketReader, Payload, PayloadType, RadioState, ReceiveEvent,
    ServiceHeader, SharedGpio, LED_BLUE,
};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::config::{FanetSection, StationSection};
use crate::station::{Observation, Station, StationError, WeatherData, NETWORK_TIMEOUT_SECS};

const TICK: Duration = Duration::from_secs(1);

/// The radio operations the dispatcher needs; `fanet::Radio` is the real
/// implementation.
#[allow(async_fn_in_trait)]
pub trait RadioLink {
    fn supports_address_change(&self) -> bool;
    async fn init(&self);
    async fn transmit(&self, addr: Address, payload: Payload) -> bool;
}

impl RadioLink for fanet::Radio {
    fn supports_address_change(&self) -> bool {
        self.supports_address_change()
    }

    async fn init(&self) {
        self.init().await
    }

    async fn transmit(&self, addr: Address, payload: Payload) -> bool {
        self.transmit(addr, payload).await
    }
}

struct StationSlot {
    station: Station,
    name: String,
    position: Coordinate,
    /// Polling interval from configuration, seconds.
    update_interval: u64,
    /// Active polling interval; 0 while updates are disabled.
    interval: u64,
    next_poll: Option<Instant>,
    in_flight: bool,
    observation: Option<Observation>,
}

impl StationSlot {
    fn new(config: &StationSection) -> Self {
        Self {
            station: Station::from_config(config),
            name: config.name.clone(),
            position: config.position(),
            update_interval: config.update_interval,
            interval: 0,
            next_poll: None,
            in_flight: false,
            observation: None,
        }
    }
}

type Sample = (usize, Result<Observation, StationError>);

enum Event {
    Radio(bool),
    Packet(Option<ReceiveEvent>),
    Sample(Option<Sample>),
    Tick,
}

/// Activity-gated broadcast scheduler. Ticks once a second while armed;
/// each tick checks the inactivity gate, then sends due name and weather
/// broadcasts, then triggers due station polls.
pub struct Dispatcher<R: RadioLink> {
    settings: FanetSection,
    radio: R,
    states: watch::Receiver<RadioState>,
    packets: PacketReader,
    gpio: SharedGpio,
    client: reqwest::Client,
    slots: Vec<StationSlot>,
    samples_tx: mpsc::Sender<Sample>,
    samples_rx: mpsc::Receiver<Sample>,
    last_node_seen: Option<Instant>,
    last_weather_tx: Option<Instant>,
    last_name_tx: Option<Instant>,
    ticker: Option<tokio::time::Interval>,
}

impl<R: RadioLink> Dispatcher<R> {
    pub fn new(
        settings: FanetSection,
        stations: &[StationSection],
        radio: R,
        states: watch::Receiver<RadioState>,
        packets: PacketReader,
        gpio: SharedGpio,
    ) -> Self {
        let (samples_tx, samples_rx) = mpsc::channel(8);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(NETWORK_TIMEOUT_SECS))
            .build()
            .expect("http client");

        Self {
            settings,
            radio,
            states,
            packets,
            gpio,
            client,
            slots: stations.iter().map(StationSlot::new).collect(),
            samples_tx,
            samples_rx,
            last_node_seen: None,
            last_weather_tx: None,
            last_name_tx: None,
            ticker: None,
        }
    }

    pub async fn run(mut self) {
        self.radio.init().await;

        loop {
            let event = {
                let Dispatcher {
                    states,
                    packets,
                    samples_rx,
                    ticker,
                    ..
                } = &mut self;
                let armed = ticker.is_some();
                tokio::select! {
                    changed = states.changed() => Event::Radio(changed.is_ok()),
                    packet = packets.next() => Event::Packet(packet),
                    sample = samples_rx.recv() => Event::Sample(sample),
                    _ = async { ticker.as_mut().expect("ticker").tick().await },
                        if armed => Event::Tick,
                }
            };

            match event {
                Event::Radio(false) | Event::Packet(None) => break, // radio task gone
                Event::Radio(true) => {
                    let state = *self.states.borrow_and_update();
                    self.on_radio_state(state).await;
                }
                Event::Packet(Some(event)) => self.on_packet(event),
                Event::Sample(Some((index, result))) => self.on_sample(index, result),
                Event::Sample(None) => {}
                Event::Tick => self.on_tick().await,
            }
        }
    }

    async fn on_radio_state(&mut self, state: RadioState) {
        match state {
            RadioState::Ready => {
                if !self.radio.supports_address_change() && self.slots.len() > 1 {
                    warn!(
                        "multiple weather stations configured but radio firmware does not \
                         support address change, broadcasting data from first weather station only"
                    );
                }
                self.enable_updates();
            }
            RadioState::Error | RadioState::ComTimeout => {
                error!("fanet radio has gone into error state");
                self.disable_updates();
                info!("trying to re-initialize radio...");
                self.radio.init().await;
            }
            state if state.is_fatal() => {
                error!("unrecoverable radio error: {}", state);
            }
            _ => {}
        }
    }

    fn on_packet(&mut self, event: ReceiveEvent) {
        match event.payload.payload_type() {
            PayloadType::Tracking | PayloadType::GroundTracking => {
                self.last_node_seen = Some(Instant::now());
                if self.ticker.is_none() {
                    info!(
                        "fanet node seen ({}), enabling weather data broadcasting...",
                        event.sender
                    );
                    self.enable_updates();
                }
            }
            _ => {}
        }
    }

    async fn on_tick(&mut self) {
        let now = Instant::now();

        if self.settings.inactivity_timeout > 0 {
            let expired = match self.last_node_seen {
                Some(seen) => now.duration_since(seen).as_secs() > self.settings.inactivity_timeout,
                None => true,
            };
            if expired {
                info!(
                    "no fanet nodes seen within the last {} minutes, disabling weather data broadcasting...",
                    self.settings.inactivity_timeout / 60
                );
                self.disable_updates();
                return;
            }
        }

        if self.settings.tx_interval_names > 0
            && due(self.last_name_tx, now, self.settings.tx_interval_names)
        {
            self.send_station_names(now).await;
        }
        if self.settings.tx_interval_weather > 0
            && due(self.last_weather_tx, now, self.settings.tx_interval_weather)
        {
            self.send_weather_data(now).await;
        }

        for index in 0..self.slots.len() {
            let slot = &self.slots[index];
            if slot.interval > 0 && slot.next_poll.map(|at| at <= now).unwrap_or(true) {
                self.spawn_poll(index, now);
            }
        }
    }

    fn enable_updates(&mut self) {
        debug!("enabling weather updates...");
        let now = Instant::now();
        for index in 0..self.slots.len() {
            self.slots[index].interval = self.slots[index].update_interval;
            if self.slots[index].interval > 0 {
                self.spawn_poll(index, now);
            }
        }
        self.ticker = Some(tokio::time::interval_at(now + TICK, TICK));
    }

    fn disable_updates(&mut self) {
        debug!("disabling weather updates...");
        for slot in &mut self.slots {
            slot.interval = 0;
            slot.next_poll = None;
        }
        self.ticker = None;
    }

    fn spawn_poll(&mut self, index: usize, now: Instant) {
        let slot = &mut self.slots[index];
        if slot.in_flight {
            // previous request still running
            return;
        }
        slot.in_flight = true;
        slot.next_poll = Some(now + Duration::from_secs(slot.interval.max(1)));
        self.gpio.lock().expect("poisoned").clear(LED_BLUE);

        let station = slot.station.clone();
        let client = self.client.clone();
        let samples = self.samples_tx.clone();
        tokio::spawn(async move {
            let result = station.fetch(&client).await;
            let _ = samples.send((index, result)).await;
        });
    }

    fn on_sample(&mut self, index: usize, result: Result<Observation, StationError>) {
        let slot = &mut self.slots[index];
        slot.in_flight = false;
        match result {
            Ok(observation) => {
                if slot.name.is_empty() {
                    if let Some(name) = observation.station_name.as_deref() {
                        slot.name = name.to_string();
                        info!("station name updated: '{}'", slot.name);
                    }
                }
                info!(
                    "station #{} ({}): new data: wind={}km/h, gusts={}km/h, dir={}, temp={}C, last update={}",
                    slot.station.id(),
                    slot.name,
                    observation.wind_speed as f64 / 10.0,
                    observation.wind_gusts as f64 / 10.0,
                    observation.wind_direction,
                    observation.temperature as f64 / 10.0,
                    observation.last_update.time(),
                );
                slot.observation = Some(observation);
                self.gpio.lock().expect("poisoned").set(LED_BLUE, true);
            }
            Err(error) => {
                // the sample is dropped; last_update stays put, so the
                // broadcast path skips this station until fresh data arrives
                warn!("station #{} update failed: {}", slot.station.id(), error);
            }
        }
    }

    async fn send_station_names(&mut self, now: Instant) {
        self.last_name_tx = Some(now);
        for slot in &self.slots {
            if !slot.name.is_empty() {
                self.radio
                    .transmit(Address::BROADCAST, Payload::name_payload(&slot.name))
                    .await;
            }
            if !self.radio.supports_address_change() {
                // stock firmware cannot change the sender address, skip the
                // other stations
                return;
            }
        }
    }

    async fn send_weather_data(&mut self, now: Instant) {
        self.last_weather_tx = Some(now);
        let deadline =
            Utc::now() - chrono::Duration::seconds(self.settings.weather_data_max_age as i64);
        for slot in &self.slots {
            match slot.observation.as_ref().filter(|obs| obs.last_update > deadline) {
                Some(observation) => {
                    let mut header = ServiceHeader::WIND;
                    if observation.available.contains(WeatherData::TEMPERATURE) {
                        header |= ServiceHeader::TEMPERATURE;
                    }
                    let payload = Payload::service(
                        header,
                        slot.position,
                        observation.temperature,
                        observation.wind_direction,
                        observation.wind_speed,
                        observation.wind_gusts,
                        0,
                        0,
                    );
                    self.radio.transmit(Address::BROADCAST, payload).await;
                }
                None => debug!(
                    "not sending weather data for station #{} ({}): station has outdated data",
                    slot.station.id(),
                    slot.name
                ),
            }
            if !self.radio.supports_address_change() {
                return;
            }
        }
    }
}

fn due(last: Option<Instant>, now: Instant, interval_secs: u64) -> bool {
    match last {
        None => true,
        Some(at) => now.duration_since(at).as_secs() > interval_secs,
    }
}
