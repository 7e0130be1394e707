use crate::command::parse_command;
use crate::world::{ChatLine, WorldView};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientMessage, ServerMessage};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

pub struct Client {
    server_url: String,
    name: String,
    view: WorldView,
}

impl Client {
    pub fn new(server_url: &str, name: &str) -> Self {
        Client {
            server_url: server_url.to_string(),
            name: name.to_string(),
            view: WorldView::new(),
        }
    }

    pub fn view(&self) -> &WorldView {
        &self.view
    }

    /// Connects, announces the player name, then relays stdin lines until
    /// either side closes.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to {}...", self.server_url);
        let (ws_stream, _) = connect_async(self.server_url.as_str()).await?;
        let (mut ws_write, mut ws_read) = ws_stream.split();
        info!("Connected");

        let join = ClientMessage::SetName {
            name: self.name.clone(),
        };
        ws_write
            .send(Message::Text(serde_json::to_string(&join)?))
            .await?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                frame = ws_read.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_frame(&text),
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Server closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("Connection error: {}", e);
                        return Err(e.into());
                    }
                },
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    match parse_command(&line) {
                        Ok(Some(message)) => {
                            if let Some(message) = self.view.prepare(message) {
                                debug!("Sending {}", message.route_key());
                                ws_write
                                    .send(Message::Text(serde_json::to_string(&message)?))
                                    .await?;
                            } else {
                                warn!("Nothing to do there");
                            }
                        }
                        Ok(None) => {}
                        Err(usage) => println!("{}", usage),
                    }
                }
            }
        }

        let _ = ws_write.close().await;
        Ok(())
    }

    fn handle_frame(&mut self, raw: &str) {
        let message = match ServerMessage::from_json(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!("Unreadable frame from server: {}", e);
                return;
            }
        };

        let chat_before = self.view.chat().len();
        debug!("Received {:?}", message);
        self.view.apply(message);

        for line in &self.view.chat()[chat_before..] {
            match line {
                ChatLine::Server(text) => println!("* {}", text),
                ChatLine::Player { name, message } => println!("<{}> {}", name, message),
            }
        }
    }
}
