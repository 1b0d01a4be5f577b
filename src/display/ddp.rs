use ddp_rs::connection::DDPConnection;
use embedded_graphics::prelude::DrawTarget;
use rgb::RGB8;
use smart_leds_matrix::layout::invert_axis::NoInvert;
use smart_leds_matrix::layout::Rectangular;
use smart_leds_matrix::SmartLedMatrix;

use super::Canvas;
use super::DisplayError;
use super::FrameSink;
use super::NUM_LEDS;
use super::NUM_LEDS_X;
use super::NUM_LEDS_Y;

/// `SmartLedsWrite` adapter that pushes the flattened RGB stream over DDP.
pub struct Writer {
    connection: DDPConnection,
    scratch: Vec<u8>,
}

impl Writer {
    pub fn new(connection: DDPConnection) -> Self {
        Self {
            connection,
            scratch: Vec::with_capacity(NUM_LEDS * 3),
        }
    }
}

impl smart_leds_trait::SmartLedsWrite for Writer {
    type Error = ddp_rs::error::DDPError;
    type Color = RGB8;

    fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        self.scratch.clear();
        self.scratch.extend(
            iterator
                .into_iter()
                .map(Into::into)
                .flat_map(|rgb: RGB8| [rgb.r, rgb.g, rgb.b]),
        );
        self.connection.write(&self.scratch).map(drop)
    }
}

pub struct DdpSink {
    matrix: SmartLedMatrix<Writer, Rectangular<NoInvert>, { NUM_LEDS }>,
}

impl DdpSink {
    pub fn connect(config: &crate::config::DisplayConfig) -> Result<Self, crate::error::Error> {
        let socket = std::net::UdpSocket::bind(format!("0.0.0.0:{}", config.udp_port))
            .map_err(crate::error::Error::UDPBind)?;

        let connection = DDPConnection::try_new(
            format!("{}:{}", config.host, config.port),
            ddp_rs::protocol::PixelConfig::default(), // RGB, 8 bits per channel
            ddp_rs::protocol::ID::Default,
            socket,
        )
        .map_err(DisplayError::from)?;

        tracing::info!(host = %config.host, port = config.port, "Connected DDP output");

        let mut matrix = SmartLedMatrix::<_, _, { NUM_LEDS }>::new(
            Writer::new(connection),
            Rectangular::new(NUM_LEDS_X as _, NUM_LEDS_Y as _),
        );
        matrix.set_brightness(config.initial_brightness.clamp(0, 100));

        Ok(Self { matrix })
    }
}

impl FrameSink for DdpSink {
    fn commit(&mut self, frame: &Canvas) -> Result<(), DisplayError> {
        self.matrix
            .draw_iter(frame.pixels())
            .map_err(|_| DisplayError::Draw)?;
        self.matrix.flush()?;
        Ok(())
    }

    fn set_brightness(&mut self, brightness: u8) {
        tracing::debug!(?brightness, "Setting matrix brightness");
        self.matrix.set_brightness(brightness);
    }
}
