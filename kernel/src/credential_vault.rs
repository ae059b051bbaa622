mod private
{
  use crate::error::{ KernelError, Result };
  use std::collections::HashMap;
  use std::sync::Mutex;
  use async_trait::async_trait;
  use secrecy::{ SecretString, ExposeSecret };

  const SALT_KEY : &str = "api_key_salt";
  const SALT_LEN : usize = 16;
  const IV_LEN : usize = 12;

  /// PBKDF2 passphrase embedded in the binary. Defense-in-depth, not secrecy —
  /// the true secrecy boundary is the host's storage sandbox. The salt is what
  /// makes encrypted keys non-portable between installations even though this
  /// constant is public.
  const APPLICATION_PASSPHRASE : &[ u8 ] = b"deepweb-extension-kernel-v1";

  /// Abstraction over wherever the encrypted blobs and salt actually live
  /// (browser extension storage, a file, an in-memory map in tests). The
  /// kernel never assumes a concrete backing store.
  #[ async_trait ]
  pub trait SecretStore : Send + Sync
  {
    /// Loads the raw bytes stored under `key`, or `None` if absent.
    async fn load( &self, key : &str ) -> Result< Option< Vec< u8 > > >;
    /// Persists `value` under `key`, overwriting any prior value.
    async fn save( &self, key : &str, value : Vec< u8 > ) -> Result< () >;
    /// Removes whatever is stored under `key`, if anything.
    async fn delete( &self, key : &str ) -> Result< () >;
  }

  /// Process-lifetime in-memory `SecretStore`. Used directly in tests and as
  /// the default backing when no host-provided store is wired in.
  #[ derive( Debug, Default ) ]
  pub struct InMemorySecretStore
  {
    entries : Mutex< HashMap< String, Vec< u8 > > >,
  }

  #[ async_trait ]
  impl SecretStore for InMemorySecretStore
  {
    async fn load( &self, key : &str ) -> Result< Option< Vec< u8 > > >
    {
      Ok( self.entries.lock().unwrap().get( key ).cloned() )
    }

    async fn save( &self, key : &str, value : Vec< u8 > ) -> Result< () >
    {
      self.entries.lock().unwrap().insert( key.to_string(), value );
      Ok( () )
    }

    async fn delete( &self, key : &str ) -> Result< () >
    {
      self.entries.lock().unwrap().remove( key );
      Ok( () )
    }
  }

  /// On-disk record shape for one provider's encrypted key.
  #[ derive( Debug, Clone, serde::Serialize, serde::Deserialize ) ]
  struct EncryptedRecord
  {
    ciphertext : Vec< u8 >,
    iv : Vec< u8 >,
  }

  /// Confidential at-rest storage and format validation of provider API keys
  /// (spec §4.1). Holds no global state; every instance owns its salt and its
  /// `SecretStore`, so the kernel never reaches for a module-level singleton
  /// (§9 redesign flag).
  #[ derive( Debug ) ]
  pub struct CredentialVault
  {
    store : std::sync::Arc< dyn SecretStore >,
    salt : Mutex< Option< [ u8; SALT_LEN ] > >,
    pbkdf2_iterations : u32,
  }

  impl CredentialVault
  {
    /// Builds a vault over the given backing store. Call `initialize` before
    /// `store`/`get`.
    #[ must_use ]
    pub fn new( store : std::sync::Arc< dyn SecretStore >, pbkdf2_iterations : u32 ) -> Self
    {
      Self { store, salt : Mutex::new( None ), pbkdf2_iterations }
    }

    /// Idempotently loads or creates the 16-byte random salt. Must complete
    /// before any `store`/`get` call; those return `Internal` if it hasn't.
    pub async fn initialize( &self ) -> Result< () >
    {
      if self.salt.lock().unwrap().is_some()
      {
        return Ok( () );
      }

      if let Some( bytes ) = self.store.load( SALT_KEY ).await?
      {
        let salt : [ u8; SALT_LEN ] = bytes.try_into()
          .map_err( | _ | KernelError::Internal( "corrupt salt record".into() ) )?;
        *self.salt.lock().unwrap() = Some( salt );
        return Ok( () );
      }

      let mut salt = [ 0_u8; SALT_LEN ];
      rand::RngCore::fill_bytes( &mut rand::rng(), &mut salt );
      self.store.save( SALT_KEY, salt.to_vec() ).await?;
      *self.salt.lock().unwrap() = Some( salt );
      Ok( () )
    }

    fn salt( &self ) -> Result< [ u8; SALT_LEN ] >
    {
      self.salt.lock().unwrap().ok_or_else( ||
        KernelError::Internal( "CredentialVault::initialize was not called".into() )
      )
    }

    fn derive_key( &self, salt : &[ u8; SALT_LEN ] ) -> [ u8; 32 ]
    {
      let mut key = [ 0_u8; 32 ];
      pbkdf2::pbkdf2_hmac::< sha2::Sha256 >(
        APPLICATION_PASSPHRASE,
        salt,
        self.pbkdf2_iterations,
        &mut key,
      );
      key
    }

    /// Encrypts `plaintext_key` and persists it keyed by `provider`.
    pub async fn store( &self, provider : &str, plaintext_key : &str ) -> Result< () >
    {
      use aes_gcm::{ Aes256Gcm, Nonce, KeyInit, aead::Aead };

      let salt = self.salt()?;
      let key_bytes = self.derive_key( &salt );
      let cipher = Aes256Gcm::new_from_slice( &key_bytes )
        .map_err( | e | KernelError::Internal( format!( "key init : {e}" ) ) )?;

      let mut iv = [ 0_u8; IV_LEN ];
      rand::RngCore::fill_bytes( &mut rand::rng(), &mut iv );
      let nonce = Nonce::from_slice( &iv );

      let ciphertext = cipher.encrypt( nonce, plaintext_key.as_bytes() )
        .map_err( | e | KernelError::Internal( format!( "encrypt : {e}" ) ) )?;

      let record = EncryptedRecord { ciphertext, iv : iv.to_vec() };
      let bytes = serde_json::to_vec( &record )?;
      self.store.save( &record_key( provider ), bytes ).await
    }

    /// Returns the plaintext key for `provider`, or `None` if absent. Never
    /// propagates a decrypt failure to the caller — it logs and returns
    /// `Ok(None)`, per spec.
    pub async fn get( &self, provider : &str ) -> Result< Option< SecretString > >
    {
      let Some( bytes ) = self.store.load( &record_key( provider ) ).await? else
      {
        return Ok( None );
      };

      let record : EncryptedRecord = match serde_json::from_slice( &bytes )
      {
        Ok( r ) => r,
        Err( e ) =>
        {
          tracing::warn!( provider, error = %e, "failed to parse encrypted credential record" );
          return Ok( None );
        }
      };

      let salt = match self.salt()
      {
        Ok( s ) => s,
        Err( e ) => return Err( e ),
      };
      let key_bytes = self.derive_key( &salt );

      use aes_gcm::{ Aes256Gcm, Nonce, KeyInit, aead::Aead };
      let cipher = match Aes256Gcm::new_from_slice( &key_bytes )
      {
        Ok( c ) => c,
        Err( e ) =>
        {
          tracing::warn!( provider, error = %e, "failed to initialize cipher for credential" );
          return Ok( None );
        }
      };

      if record.iv.len() != IV_LEN
      {
        tracing::warn!( provider, "credential record has malformed IV length" );
        return Ok( None );
      }
      let nonce = Nonce::from_slice( &record.iv );

      match cipher.decrypt( nonce, record.ciphertext.as_ref() )
      {
        Ok( plaintext ) => match String::from_utf8( plaintext )
        {
          Ok( s ) => Ok( Some( SecretString::new( s.into_boxed_str() ) ) ),
          Err( e ) =>
          {
            tracing::warn!( provider, error = %e, "decrypted credential was not valid utf-8" );
            Ok( None )
          }
        },
        Err( e ) =>
        {
          tracing::warn!( provider, error = %e, "failed to decrypt credential" );
          Ok( None )
        }
      }
    }

    /// Deletes the stored record for `provider`, if any.
    pub async fn remove( &self, provider : &str ) -> Result< () >
    {
      self.store.delete( &record_key( provider ) ).await
    }

    /// Structural-only format check, not a correctness check against the
    /// provider: `sk-` prefix with length 20–200, or `sk-ant-` prefix with
    /// length ≥ 40.
    #[ must_use ]
    pub fn validate_format( _provider : &str, key : &str ) -> bool
    {
      let sk_ant = key.starts_with( "sk-ant-" ) && key.len() >= 40;
      let sk = key.starts_with( "sk-" ) && !key.starts_with( "sk-ant-" ) && ( 20..=200 ).contains( &key.len() );
      sk_ant || sk
    }
  }

  fn record_key( provider : &str ) -> String
  {
    format!( "encrypted_api_key_{provider}" )
  }

  // Silence the unused-import warning when `expose_secret` is only used by
  // downstream crates via the re-exported `SecretString`.
  #[ allow( unused_imports ) ]
  use ExposeSecret as _;

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use secrecy::ExposeSecret;

    fn vault() -> CredentialVault
    {
      CredentialVault::new( std::sync::Arc::new( InMemorySecretStore::default() ), 100 )
    }

    #[ tokio::test ]
    async fn round_trips_a_stored_key()
    {
      let vault = vault();
      vault.initialize().await.unwrap();
      vault.store( "deepseek", "sk-aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa" ).await.unwrap();
      let got = vault.get( "deepseek" ).await.unwrap().unwrap();
      assert_eq!( got.expose_secret(), "sk-aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa" );
    }

    #[ tokio::test ]
    async fn missing_key_returns_none()
    {
      let vault = vault();
      vault.initialize().await.unwrap();
      assert!( vault.get( "openai" ).await.unwrap().is_none() );
    }

    #[ tokio::test ]
    async fn decrypt_failure_returns_none_not_err()
    {
      let store = std::sync::Arc::new( InMemorySecretStore::default() );
      let vault = CredentialVault::new( store.clone(), 100 );
      vault.initialize().await.unwrap();
      store.save( &record_key( "openai" ), b"not even json".to_vec() ).await.unwrap();
      assert!( vault.get( "openai" ).await.unwrap().is_none() );
    }

    #[ tokio::test ]
    async fn remove_deletes_the_record()
    {
      let vault = vault();
      vault.initialize().await.unwrap();
      vault.store( "anthropic", &format!( "sk-ant-{}", "a".repeat( 40 ) ) ).await.unwrap();
      vault.remove( "anthropic" ).await.unwrap();
      assert!( vault.get( "anthropic" ).await.unwrap().is_none() );
    }

    #[ test ]
    fn validate_format_boundary_lengths()
    {
      assert!( !CredentialVault::validate_format( "openai", &format!( "sk-{}", "a".repeat( 16 ) ) ) ); // len 19
      assert!( CredentialVault::validate_format( "openai", &format!( "sk-{}", "a".repeat( 48 ) ) ) ); // len 51
      assert!( !CredentialVault::validate_format( "anthropic", &format!( "sk-ant-{}", "a".repeat( 32 ) ) ) ); // len 39
      assert!( CredentialVault::validate_format( "anthropic", &format!( "sk-ant-{}", "a".repeat( 33 ) ) ) ); // len 40
    }
  }
}

crate::mod_interface!
{
  exposed use
  {
    SecretStore,
    InMemorySecretStore,
    CredentialVault,
  };
}
