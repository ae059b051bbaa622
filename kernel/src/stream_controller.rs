mod private
{
  use crate::dispatcher::{ DispatchRequest, Dispatcher };
  use crate::error::Result;
  use crate::provider_registry::registry::ProviderRegistry;
  use crate::provider_registry::types::ProviderStreamEvent;
  use crate::storage_engine::engine::StorageEngine;
  use crate::storage_engine::message::{ MessageMetadata, MessageRole, NewMessage };
  use futures_core::stream::BoxStream;
  use futures_util::StreamExt;
  use std::collections::HashMap;
  use std::sync::Mutex;
  use std::sync::Arc;
  use tokio::sync::watch;

  /// One event emitted to a streaming client (spec §4.6).
  #[ derive( Debug, Clone ) ]
  pub enum StreamEvent
  {
    /// The very first event on any session.
    Started
    {
      /// Opaque id the client echoes back in `cancel_stream`.
      stream_id : String,
    },
    /// An incremental content delta.
    Content
    {
      /// The delta text.
      delta : String,
    },
    /// A named, provider-specific passthrough event.
    Event
    {
      /// Provider event name.
      name : String,
    },
    /// A reconnect is about to happen after this delay.
    StreamRetry
    {
      /// Milliseconds before the next attempt.
      delay_ms : u64,
    },
    /// A reconnect attempt is in progress.
    Reconnecting
    {
      /// 1-indexed attempt number.
      attempt : u32,
    },
    /// Terminal : the stream completed normally.
    Done
    {
      /// Final assembled content.
      content : String,
      /// Token usage for the completed response.
      usage : crate::provider_registry::types::Usage,
      /// USD cost of the exchange.
      cost : f64,
      /// Provider-reported finish reason, if any.
      finish_reason : Option< String >,
    },
    /// Terminal : the client (or a port disconnect) cancelled the session.
    Cancelled
    {
      /// Content accumulated before cancellation.
      content : String,
    },
    /// Terminal : a non-recoverable failure, or reconnect attempts exhausted.
    Error
    {
      /// Human-readable message.
      message : String,
      /// Whether a fresh attempt from the client might still succeed.
      recoverable : bool,
    },
  }

  /// Manages long-lived duplex streaming sessions : cancellation,
  /// reconnection with truncate-and-restart, and terminal accounting (spec
  /// §4.6). One instance is shared across every session the kernel serves.
  pub struct StreamController
  {
    dispatcher : Arc< Dispatcher >,
    provider_registry : Arc< ProviderRegistry >,
    storage_engine : Arc< StorageEngine >,
    max_reconnect_attempts : u32,
    backoff_cap_ms : u64,
    backoff_jitter : f64,
    sessions : Mutex< HashMap< String, watch::Sender< bool > > >,
    /// At most one live session per `(clientId, conversationId)` pair (spec
    /// §3) : starting a second implicitly cancels the first.
    by_client_conversation : Mutex< HashMap< ( String, String ), String > >,
  }

  fn reconnect_delay_ms( attempt : u32, cap_ms : u64, jitter : f64 ) -> u64
  {
    let base = 100_u64.saturating_mul( 1_u64 << attempt.min( 16 ) ).min( cap_ms );
    let jitter_span = ( base as f64 * jitter ) as u64;
    if jitter_span == 0
    {
      return base;
    }
    let offset = rand::Rng::random_range( &mut rand::rng(), 0..=jitter_span );
    base.saturating_sub( jitter_span / 2 ).saturating_add( offset ).min( cap_ms )
  }

  impl StreamController
  {
    /// Wires the collaborators a streaming session needs.
    #[ must_use ]
    pub fn new(
      dispatcher : Arc< Dispatcher >,
      provider_registry : Arc< ProviderRegistry >,
      storage_engine : Arc< StorageEngine >,
      max_reconnect_attempts : u32,
      backoff_cap_ms : u64,
      backoff_jitter : f64,
    ) -> Self
    {
      Self
      {
        dispatcher,
        provider_registry,
        storage_engine,
        max_reconnect_attempts,
        backoff_cap_ms,
        backoff_jitter,
        sessions : Mutex::new( HashMap::new() ),
        by_client_conversation : Mutex::new( HashMap::new() ),
      }
    }

    /// Signals cancellation of `stream_id`. Idempotent : cancelling an
    /// already-terminal or unknown session is a no-op (spec §4.6).
    pub fn cancel_stream( &self, stream_id : &str )
    {
      if let Some( sender ) = self.sessions.lock().unwrap().get( stream_id )
      {
        let _ = sender.send( true );
      }
    }

    /// Starts a session : runs dispatch steps 1–7 (policy gate, provider and
    /// credential resolution, conversation setup, user-message persistence),
    /// then returns the session's id alongside its event stream. Step 9
    /// (persisting the assistant message) happens internally when the
    /// stream reaches `Done`.
    pub async fn start_stream( self : Arc< Self >, request : DispatchRequest )
      -> Result< ( String, BoxStream< 'static, StreamEvent > ) >
    {
      let ( conversation_id, api_key, chat_request ) = self.dispatcher.prepare( &request ).await?;

      let session_key = ( request.client_id.clone(), conversation_id.clone() );
      if let Some( previous ) = self.by_client_conversation.lock().unwrap().get( &session_key ).cloned()
      {
        self.cancel_stream( &previous );
      }

      let stream_id = uuid::Uuid::new_v4().to_string();
      let ( cancel_tx, mut cancel_rx ) = watch::channel( false );
      self.sessions.lock().unwrap().insert( stream_id.clone(), cancel_tx );
      self.by_client_conversation.lock().unwrap().insert( session_key.clone(), stream_id.clone() );

      let controller = Arc::clone( &self );
      let model = request.model.clone();
      let session_id = stream_id.clone();
      let cleanup_key = session_key;

      let events = async_stream::stream!
      {
        yield StreamEvent::Started { stream_id : session_id.clone() };

        let mut accumulated = String::new();
        let mut attempt = 0_u32;

        'reconnect : loop
        {
          let mut provider_stream = match controller.provider_registry.stream( &model, &api_key, &chat_request ).await
          {
            Ok( stream ) => stream,
            Err( error ) =>
            {
              yield StreamEvent::Error { message : error.to_string(), recoverable : error.recoverable() };
              break 'reconnect;
            }
          };

          loop
          {
            let next = tokio::select!
            {
              biased;
              changed = cancel_rx.changed() =>
              {
                if changed.is_ok() && *cancel_rx.borrow()
                {
                  yield StreamEvent::Cancelled { content : accumulated.clone() };
                  break 'reconnect;
                }
                continue;
              }
              next = provider_stream.next() => next,
            };

            match next
            {
              None =>
              {
                // Source ended without an explicit Done : treat like a
                // transient transport drop (spec §4.6 reconnection).
                attempt += 1;
                if attempt > controller.max_reconnect_attempts
                {
                  yield StreamEvent::Error
                  {
                    message : "stream ended without completion and reconnect attempts are exhausted".into(),
                    recoverable : false,
                  };
                  break 'reconnect;
                }
                let delay_ms = reconnect_delay_ms( attempt, controller.backoff_cap_ms, controller.backoff_jitter );
                yield StreamEvent::Reconnecting { attempt };
                yield StreamEvent::StreamRetry { delay_ms };
                accumulated.clear();
                tokio::time::sleep( std::time::Duration::from_millis( delay_ms ) ).await;
                continue 'reconnect;
              }
              Some( Ok( ProviderStreamEvent::ContentDelta( delta ) ) ) =>
              {
                accumulated.push_str( &delta );
                yield StreamEvent::Content { delta };
              }
              Some( Ok( ProviderStreamEvent::Named( name ) ) ) =>
              {
                yield StreamEvent::Event { name };
              }
              Some( Ok( ProviderStreamEvent::Done { final_content, usage, finish_reason } ) ) =>
              {
                let content = final_content.unwrap_or_else( || accumulated.clone() );
                let cost = crate::provider_registry::cost::compute_cost( usage, &model );

                let persisted = controller.storage_engine.add_message(
                  &conversation_id,
                  NewMessage
                  {
                    role : MessageRole::Assistant,
                    content : content.clone(),
                    metadata : MessageMetadata { model : Some( model.clone() ), tokens : Some( usage.total() ) },
                    cost,
                  },
                ).await;

                if let Err( error ) = persisted
                {
                  yield StreamEvent::Error { message : error.to_string(), recoverable : error.recoverable() };
                  break 'reconnect;
                }

                yield StreamEvent::Done { content, usage, cost, finish_reason };
                break 'reconnect;
              }
              Some( Err( crate::error::KernelError::ResponseMalformed( reason ) ) ) =>
              {
                tracing::warn!( reason, "skipping malformed stream event" );
              }
              Some( Err( error ) ) if error.recoverable() =>
              {
                attempt += 1;
                if attempt > controller.max_reconnect_attempts
                {
                  yield StreamEvent::Error { message : error.to_string(), recoverable : false };
                  break 'reconnect;
                }
                let delay_ms = reconnect_delay_ms( attempt, controller.backoff_cap_ms, controller.backoff_jitter );
                yield StreamEvent::Reconnecting { attempt };
                yield StreamEvent::StreamRetry { delay_ms };
                accumulated.clear();
                tokio::time::sleep( std::time::Duration::from_millis( delay_ms ) ).await;
                continue 'reconnect;
              }
              Some( Err( error ) ) =>
              {
                yield StreamEvent::Error { message : error.to_string(), recoverable : false };
                break 'reconnect;
              }
            }
          }
        }

        controller.sessions.lock().unwrap().remove( &session_id );
        let mut by_pair = controller.by_client_conversation.lock().unwrap();
        if by_pair.get( &cleanup_key ) == Some( &session_id )
        {
          by_pair.remove( &cleanup_key );
        }
      };

      Ok( ( stream_id, Box::pin( events ) ) )
    }
  }
}

crate::mod_interface!
{
  exposed use
  {
    StreamEvent,
    StreamController,
  };
}
