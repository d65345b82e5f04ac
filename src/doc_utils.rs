use futures::future::BoxFuture;

use crate::{
    connection::{Connection, Message},
    Error,
};

pub struct Conn;

impl Connection for Conn {
    fn receive(&mut self) -> BoxFuture<'_, Option<Message>> {
        unimplemented!()
    }

    fn send(&mut self, _: Message) -> BoxFuture<'_, Result<(), Error>> {
        unimplemented!()
    }
}
